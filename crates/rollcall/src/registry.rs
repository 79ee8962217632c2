//! Registration, reset and attendance marking.
//!
//! [`Registry`] owns the record store and the image directory and applies the
//! duplicate rules:
//!
//! - A registration is a duplicate when any stored identifier starts with the
//!   requested roll prefix *and* an image for that identifier exists. This is
//!   a prefix match, so roll `R1` collides with a stored `R10_xxxxx`.
//! - Attendance is marked at most once per identifier (exact match).
//!
//! Callers that share a registry across threads must serialize access; the
//! HTTP layer keeps it behind a single mutex.

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identifier::generate_identifier;
use crate::model::{AttendanceRecord, Student};
use crate::qr::QrImages;
use crate::storage::{open_store, RecordStore};

/// Literal an operator must type to confirm a reset.
pub const RESET_CONFIRMATION: &str = "DELETE";

/// Fields submitted by the registration form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationForm {
    /// Shared secret.
    pub password: String,
    /// Student name.
    pub name: String,
    /// Roll prefix the identifier is generated from.
    pub roll: String,
    /// Department.
    pub dept: String,
    /// Year of study.
    pub year: String,
    /// Section.
    pub section: String,
}

/// Result of a registration attempt that passed the secret check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrollment {
    /// A new student was stored and an image generated.
    Created {
        /// The stored student.
        student: Student,
        /// File name of the generated image.
        image: String,
    },
    /// An existing identifier matched the roll prefix; nothing was written.
    Duplicate {
        /// Identifier of the matching student.
        roll_no: String,
        /// File name of its existing image.
        image: String,
    },
}

impl Enrollment {
    /// File name of the image to show.
    #[must_use]
    pub fn image(&self) -> &str {
        match self {
            Self::Created { image, .. } | Self::Duplicate { image, .. } => image,
        }
    }

    /// Whether this attempt matched an existing registration.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// What a reset removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    /// Number of students removed.
    pub students: usize,
    /// Number of attendance records removed.
    pub attendance: usize,
    /// Number of image files deleted.
    pub images: usize,
}

/// Status tag of a mark-attendance response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkStatus {
    /// Missing data or unknown identifier.
    Error,
    /// Attendance was already marked for this identifier.
    Exists,
    /// Attendance was recorded.
    Success,
}

/// Response body of the mark-attendance endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOutcome {
    /// Outcome tag.
    pub status: MarkStatus,
    /// Human-readable message.
    pub message: String,
}

impl MarkOutcome {
    fn new(status: MarkStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Map a domain error onto the status/message pair, if it has one.
    #[must_use]
    pub fn from_error(err: &Error) -> Option<Self> {
        match err {
            Error::NotFound { identifier } => Some(Self::new(
                MarkStatus::Error,
                format!("Student not found for QR {identifier}"),
            )),
            Error::Validation { message } => Some(Self::new(MarkStatus::Error, message.clone())),
            Error::Conflict { message } => Some(Self::new(MarkStatus::Exists, message.clone())),
            _ => None,
        }
    }
}

/// The student registry.
#[derive(Debug)]
pub struct Registry {
    store: Box<dyn RecordStore>,
    images: QrImages,
    admin_password: String,
}

impl Registry {
    /// Build a registry from its parts.
    #[must_use]
    pub fn new(
        store: Box<dyn RecordStore>,
        images: QrImages,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            store,
            images,
            admin_password: admin_password.into(),
        }
    }

    /// Open the store and image directory described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if either cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let store = open_store(config)?;
        let images = QrImages::open(config.qr_dir())?;
        Ok(Self::new(store, images, config.auth.admin_password.clone()))
    }

    /// The image directory.
    #[must_use]
    pub fn images(&self) -> &QrImages {
        &self.images
    }

    /// The underlying record store.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    fn authorize(&self, password: &str) -> Result<()> {
        if password == self.admin_password {
            Ok(())
        } else {
            warn!("Rejected request with incorrect password");
            Err(Error::Unauthorized)
        }
    }

    /// Register a student using the thread-local random generator.
    ///
    /// # Errors
    ///
    /// See [`Registry::register_with`].
    pub fn register(&mut self, form: &RegistrationForm) -> Result<Enrollment> {
        self.register_with(form, &mut rand::thread_rng())
    }

    /// Register a student, drawing the identifier suffix from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for a wrong secret,
    /// [`Error::Validation`] for a roll prefix that is not a plain file name
    /// fragment, or a storage/image error.
    pub fn register_with<R: Rng + ?Sized>(
        &mut self,
        form: &RegistrationForm,
        rng: &mut R,
    ) -> Result<Enrollment> {
        self.authorize(&form.password)?;
        validate_roll(&form.roll)?;

        if let Some(duplicate) = self.find_duplicate(&form.roll)? {
            info!(
                "Roll {} matches existing {}, returning its image",
                form.roll, duplicate.0
            );
            return Ok(Enrollment::Duplicate {
                roll_no: duplicate.0,
                image: duplicate.1,
            });
        }

        let roll_no = generate_identifier(&form.roll, rng);
        let image = self.images.write(&roll_no)?;
        let student = Student {
            roll_no,
            name: form.name.clone(),
            dept: form.dept.clone(),
            year: form.year.clone(),
            section: form.section.clone(),
        };
        self.store.append_student(&student)?;

        info!("Registered {} as {}", student.name, student.roll_no);
        Ok(Enrollment::Created { student, image })
    }

    /// First stored identifier starting with `roll` that still has an image.
    fn find_duplicate(&self, roll: &str) -> Result<Option<(String, String)>> {
        for student in self.store.list_students()? {
            if !student.roll_no.starts_with(roll) {
                continue;
            }
            match self.images.find_by_prefix(&student.roll_no)? {
                Some(image) => return Ok(Some((student.roll_no, image))),
                None => debug!("{} has no image on disk, skipping", student.roll_no),
            }
        }
        Ok(None)
    }

    /// Delete every image and truncate both tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for a wrong secret,
    /// [`Error::Validation`] unless `confirm_text` is exactly
    /// [`RESET_CONFIRMATION`], or a storage error.
    pub fn reset(&mut self, password: &str, confirm_text: &str) -> Result<ResetSummary> {
        self.authorize(password)?;
        if confirm_text != RESET_CONFIRMATION {
            return Err(Error::validation(format!(
                "You must type {RESET_CONFIRMATION} to confirm!"
            )));
        }

        let students = self.store.list_students()?.len();
        let attendance = self.store.list_attendance()?.len();
        let images = self.images.clear()?;
        self.store.reset()?;

        let summary = ResetSummary {
            students,
            attendance,
            images,
        };
        info!(
            "Reset removed {} students, {} attendance records, {} images",
            summary.students, summary.attendance, summary.images
        );
        Ok(summary)
    }

    /// Mark attendance for the scanned identifier at time `now`.
    ///
    /// Every outcome other than a storage failure is reported through the
    /// returned [`MarkOutcome`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be read or written.
    pub fn mark_attendance(
        &mut self,
        qr_data: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<MarkOutcome> {
        match self.try_mark(qr_data, now) {
            Ok(student) => Ok(MarkOutcome::new(
                MarkStatus::Success,
                format!("Attendance marked for {}", student.name),
            )),
            Err(err) => MarkOutcome::from_error(&err).ok_or(err),
        }
    }

    fn try_mark(&mut self, qr_data: Option<&str>, now: NaiveDateTime) -> Result<Student> {
        let roll_no = qr_data.map(str::trim).unwrap_or_default();
        if roll_no.is_empty() {
            return Err(Error::validation("No QR data received"));
        }

        let Some(student) = self.store.find_student(roll_no)? else {
            debug!("No student for scanned {roll_no:?}");
            return Err(Error::NotFound {
                identifier: roll_no.to_string(),
            });
        };

        if self.store.find_attendance(roll_no)?.is_some() {
            debug!("{} already marked", student.roll_no);
            return Err(Error::conflict(format!("{} already marked!", student.name)));
        }

        self.store
            .append_attendance(&AttendanceRecord::for_student(&student, now))?;
        info!("Marked attendance for {} ({})", student.name, student.roll_no);
        Ok(student)
    }
}

/// Roll prefixes become file names, so they may not carry path components.
fn validate_roll(roll: &str) -> Result<()> {
    if roll.contains(['/', '\\']) || roll == "." || roll == ".." {
        return Err(Error::validation(format!(
            "Roll number {roll:?} may not contain path separators"
        )));
    }
    Ok(())
}
