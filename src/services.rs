//! Typed REST services layered over [`Gateway::send`](crate::gateway::Gateway::send).
//!
//! Services never talk to the refresh endpoint themselves; a 401 on any of their calls goes
//! through the gateway's single-flight refresh like every other request.

pub mod forms;
pub mod user;

pub use forms::*;
pub use user::*;

// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpSpan},
};

/// Minimum password length accepted by the backend.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Client-side input checks that reject a payload before it is sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ValidationError {
	/// A required field is blank.
	#[error("Field `{field}` cannot be empty.")]
	EmptyField {
		/// Name of the blank field.
		field: String,
	},
	/// Password is shorter than [`MIN_PASSWORD_LEN`].
	#[error("Password must be at least {min} characters long.")]
	PasswordTooShort {
		/// Required minimum length.
		min: usize,
	},
	/// Password and its confirmation differ.
	#[error("Passwords do not match.")]
	PasswordMismatch,
	/// A form template needs at least one field.
	#[error("At least one field is required.")]
	NoFields,
	/// A form field has a blank label.
	#[error("Field at index {index} is missing a label.")]
	MissingLabel {
		/// Position of the field in the draft.
		index: usize,
	},
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), ValidationError> {
	if value.trim().is_empty() {
		Err(ValidationError::EmptyField { field: field.to_owned() })
	} else {
		Ok(())
	}
}

pub(crate) fn check_new_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
	if password.chars().count() < MIN_PASSWORD_LEN {
		return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
	}
	if password != confirmation {
		return Err(ValidationError::PasswordMismatch);
	}

	Ok(())
}

/// Runs a service call inside an `ems_gateway.op` span and records its outcome.
pub(crate) async fn observe<F, R>(stage: &'static str, call: F) -> Result<R>
where
	F: Future<Output = Result<R>>,
{
	obs::observe(OpKind::Service, OpSpan::new(OpKind::Service, stage), call).await
}
