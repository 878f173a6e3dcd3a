//! Custom field definitions
//!
//! A custom field is a named alias over a scalar attribute type, registered
//! by a plugin. Attributes of type `customField` are resolved to that
//! underlying type before validation or column mapping.

use serde::{Deserialize, Serialize};

use super::attribute::AttributeType;

/// Registered custom field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDefinition {
	/// `plugin::<plugin>.<name>` or `global::<name>`
	pub uid: String,

	/// Underlying scalar type
	#[serde(rename = "type")]
	pub kind: AttributeType,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub plugin: Option<String>,
}

impl CustomFieldDefinition {
	pub fn new(uid: impl Into<String>, kind: AttributeType) -> Self {
		let uid = uid.into();
		let plugin = uid
			.strip_prefix("plugin::")
			.and_then(|rest| rest.split('.').next())
			.map(str::to_string);
		Self { uid, kind, plugin }
	}
}
