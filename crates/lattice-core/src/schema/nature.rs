//! Relation natures.
//!
//! A nature names the cardinality of a relation from the declaring side.
//! Polymorphic natures are grouped under [`Nature::Morph`] so callers match
//! on the sub-variant instead of inspecting names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::exception::SchemaError;

/// Polymorphic relation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MorphKind {
	/// Single owner slot pointing at a model that relates to one polymorphic owner
	OneToOneMorph,
	/// Single owner slot pointing at a model that relates to many polymorphic owners
	OneToManyMorph,
	/// Many owner slots pointing at a model that relates to many polymorphic owners
	ManyToManyMorph,
	/// The polymorphic side relating to a single owner row
	ManyMorphToOne,
	/// The polymorphic side relating to many owner rows
	ManyMorphToMany,
}

impl MorphKind {
	/// Whether this is the side whose target varies per row
	pub fn is_polymorphic_side(&self) -> bool {
		matches!(self, MorphKind::ManyMorphToOne | MorphKind::ManyMorphToMany)
	}
}

/// Relation nature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nature {
	OneToOne,
	OneToMany,
	ManyToOne,
	ManyToMany,
	OneWay,
	ManyWay,
	Morph(MorphKind),
}

impl Nature {
	/// Canonical name used in schema documents
	pub fn as_str(&self) -> &'static str {
		match self {
			Nature::OneToOne => "oneToOne",
			Nature::OneToMany => "oneToMany",
			Nature::ManyToOne => "manyToOne",
			Nature::ManyToMany => "manyToMany",
			Nature::OneWay => "oneWay",
			Nature::ManyWay => "manyWay",
			Nature::Morph(MorphKind::OneToOneMorph) => "oneToOneMorph",
			Nature::Morph(MorphKind::OneToManyMorph) => "oneToManyMorph",
			Nature::Morph(MorphKind::ManyToManyMorph) => "manyToManyMorph",
			Nature::Morph(MorphKind::ManyMorphToOne) => "manyMorphToOne",
			Nature::Morph(MorphKind::ManyMorphToMany) => "manyMorphToMany",
		}
	}

	/// Descriptive name of the nature, as used in ORM terminology
	pub fn verbose(&self) -> &'static str {
		match self {
			Nature::OneToOne | Nature::ManyToOne | Nature::OneWay => "belongsTo",
			Nature::OneToMany => "hasMany",
			Nature::ManyToMany | Nature::ManyWay => "belongsToMany",
			Nature::Morph(MorphKind::OneToOneMorph) | Nature::Morph(MorphKind::OneToManyMorph) => {
				"morphOne"
			}
			Nature::Morph(MorphKind::ManyToManyMorph) => "morphMany",
			Nature::Morph(MorphKind::ManyMorphToOne) => "belongsToMorph",
			Nature::Morph(MorphKind::ManyMorphToMany) => "belongsToManyMorph",
		}
	}

	/// Whether the declaring side holds a list of targets
	pub fn is_collection(&self) -> bool {
		matches!(
			self,
			Nature::OneToMany
				| Nature::ManyToMany
				| Nature::ManyWay
				| Nature::Morph(MorphKind::ManyToManyMorph)
				| Nature::Morph(MorphKind::ManyMorphToMany)
		)
	}

	/// Whether the relation requires a counterpart attribute on the target
	pub fn is_bidirectional(&self) -> bool {
		matches!(
			self,
			Nature::OneToOne | Nature::OneToMany | Nature::ManyToOne | Nature::ManyToMany
		)
	}

	/// Whether the declaring side has a column pointing at the target
	pub fn owns_column(&self) -> bool {
		matches!(self, Nature::OneToOne | Nature::ManyToOne | Nature::OneWay)
	}

	/// Polymorphic sub-kind, if any
	pub fn morph(&self) -> Option<MorphKind> {
		match self {
			Nature::Morph(kind) => Some(*kind),
			_ => None,
		}
	}

	/// The nature the counterpart attribute must declare
	pub fn counterpart(&self) -> Option<Nature> {
		match self {
			Nature::OneToOne => Some(Nature::OneToOne),
			Nature::OneToMany => Some(Nature::ManyToOne),
			Nature::ManyToOne => Some(Nature::OneToMany),
			Nature::ManyToMany => Some(Nature::ManyToMany),
			_ => None,
		}
	}

	/// Nature implied by the cardinality of both sides
	///
	/// `counterpart` is the cardinality of the target's `via` attribute, or
	/// `None` for a unidirectional relation.
	///
	/// # Examples
	///
	/// ```
	/// use lattice_core::schema::Nature;
	///
	/// assert_eq!(Nature::infer(true, None), Nature::ManyWay);
	/// assert_eq!(Nature::infer(false, Some(true)), Nature::ManyToOne);
	/// assert_eq!(Nature::infer(true, Some(true)), Nature::ManyToMany);
	/// ```
	pub fn infer(collection: bool, counterpart: Option<bool>) -> Nature {
		match (collection, counterpart) {
			(false, None) => Nature::OneWay,
			(true, None) => Nature::ManyWay,
			(false, Some(false)) => Nature::OneToOne,
			(false, Some(true)) => Nature::ManyToOne,
			(true, Some(false)) => Nature::OneToMany,
			(true, Some(true)) => Nature::ManyToMany,
		}
	}
}

impl fmt::Display for Nature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Nature {
	type Err = SchemaError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let nature = match s {
			"oneToOne" | "hasOne" => Nature::OneToOne,
			"oneToMany" | "hasMany" => Nature::OneToMany,
			"manyToOne" | "belongsTo" => Nature::ManyToOne,
			"manyToMany" | "belongsToMany" => Nature::ManyToMany,
			"oneWay" => Nature::OneWay,
			"manyWay" => Nature::ManyWay,
			"oneToOneMorph" => Nature::Morph(MorphKind::OneToOneMorph),
			"oneToManyMorph" | "morphOne" => Nature::Morph(MorphKind::OneToManyMorph),
			"manyToManyMorph" | "morphMany" => Nature::Morph(MorphKind::ManyToManyMorph),
			"manyMorphToOne" | "belongsToMorph" | "morphToOne" => {
				Nature::Morph(MorphKind::ManyMorphToOne)
			}
			"manyMorphToMany" | "belongsToManyMorph" | "morphToMany" => {
				Nature::Morph(MorphKind::ManyMorphToMany)
			}
			other => {
				return Err(SchemaError::Parse(format!(
					"unknown relation nature \"{}\"",
					other
				)));
			}
		};
		Ok(nature)
	}
}

impl Serialize for Nature {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for Nature {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("manyToMany", Nature::ManyToMany)]
	#[case("belongsToMorph", Nature::Morph(MorphKind::ManyMorphToOne))]
	#[case("belongsToManyMorph", Nature::Morph(MorphKind::ManyMorphToMany))]
	#[case("morphMany", Nature::Morph(MorphKind::ManyToManyMorph))]
	#[case("morphOne", Nature::Morph(MorphKind::OneToManyMorph))]
	fn test_parse_nature_aliases(#[case] raw: &str, #[case] expected: Nature) {
		assert_eq!(raw.parse::<Nature>().unwrap(), expected);
	}

	#[rstest]
	fn test_unknown_nature_is_rejected() {
		let err = "sideways".parse::<Nature>().unwrap_err();
		assert!(err.to_string().contains("sideways"));
	}

	#[rstest]
	#[case(Nature::OneToMany, Some(Nature::ManyToOne))]
	#[case(Nature::ManyToMany, Some(Nature::ManyToMany))]
	#[case(Nature::ManyWay, None)]
	fn test_counterpart(#[case] nature: Nature, #[case] expected: Option<Nature>) {
		assert_eq!(nature.counterpart(), expected);
	}

	#[rstest]
	#[case(Nature::OneToOne)]
	#[case(Nature::OneToMany)]
	#[case(Nature::ManyToOne)]
	#[case(Nature::ManyToMany)]
	fn test_infer_agrees_with_counterpart(#[case] nature: Nature) {
		let other = nature.counterpart().unwrap();
		assert_eq!(
			Nature::infer(nature.is_collection(), Some(other.is_collection())),
			nature
		);
	}
}
