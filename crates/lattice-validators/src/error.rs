//! Validation and build errors

use lattice_core::SchemaError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One step of a path into a validated value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
	Key(String),
	Index(usize),
}

/// Location of a value inside the validated document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
	pub fn root() -> Self {
		Self(Vec::new())
	}

	pub fn key(&self, key: impl Into<String>) -> Self {
		let mut segments = self.0.clone();
		segments.push(PathSegment::Key(key.into()));
		Self(segments)
	}

	pub fn index(&self, index: usize) -> Self {
		let mut segments = self.0.clone();
		segments.push(PathSegment::Index(index));
		Self(segments)
	}

	pub fn segments(&self) -> &[PathSegment] {
		&self.0
	}

	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for FieldPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (position, segment) in self.0.iter().enumerate() {
			match segment {
				PathSegment::Key(key) if position == 0 => write!(f, "{}", key)?,
				PathSegment::Key(key) => write!(f, ".{}", key)?,
				PathSegment::Index(index) => write!(f, "[{}]", index)?,
			}
		}
		Ok(())
	}
}

/// Machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
	Required,
	InvalidType,
	TooShort,
	TooLong,
	TooSmall,
	TooLarge,
	InvalidFormat,
	NotAllowed,
	UnknownKey,
	NoMatch,
	Unresolved,
}

/// A single field-addressable validation failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
	pub path: FieldPath,
	pub code: ErrorCode,
	pub message: String,
}

impl ValidationError {
	pub fn new(path: FieldPath, code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			path,
			code,
			message: message.into(),
		}
	}
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.path.is_root() {
			write!(f, "{}", self.message)
		} else {
			write!(f, "{}: {}", self.path, self.message)
		}
	}
}

/// Every failure found while validating one value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Error)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
	pub fn new() -> Self {
		Self(Vec::new())
	}

	pub fn push(&mut self, error: ValidationError) {
		self.0.push(error);
	}

	pub fn extend(&mut self, other: ValidationErrors) {
		self.0.extend(other.0);
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
		self.0.iter()
	}

	/// Dotted paths of every error, in discovery order
	pub fn paths(&self) -> Vec<String> {
		self.0.iter().map(|e| e.path.to_string()).collect()
	}

	pub fn into_vec(self) -> Vec<ValidationError> {
		self.0
	}
}

impl fmt::Display for ValidationErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
		write!(f, "{}", rendered.join("; "))
	}
}

impl IntoIterator for ValidationErrors {
	type Item = ValidationError;
	type IntoIter = std::vec::IntoIter<ValidationError>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

/// Error raised while building a validator
#[derive(Debug, Clone, Error)]
pub enum BuildError {
	#[error(transparent)]
	Schema(#[from] SchemaError),

	#[error("Invalid pattern on {model}.{attribute}: {reason}")]
	InvalidPattern {
		model: String,
		attribute: String,
		reason: String,
	},

	#[error("Unknown query parameter \"{0}\"")]
	UnknownQueryParam(String),
}

pub type Result<T> = std::result::Result<T, BuildError>;
