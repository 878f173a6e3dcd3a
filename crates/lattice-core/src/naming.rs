//! Naming helpers for deriving table and column identifiers.

use convert_case::{Case, Casing};

/// Convert an identifier to snake_case.
///
/// # Examples
///
/// ```
/// use lattice_core::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("relatedArticles"), "related_articles");
/// assert_eq!(to_snake_case("already_snake"), "already_snake");
/// ```
pub fn to_snake_case(name: &str) -> String {
	name.to_case(Case::Snake)
}

/// Irregular plurals seen in content-type table names.
const IRREGULAR: &[(&str, &str)] = &[
	("people", "person"),
	("children", "child"),
	("men", "man"),
	("women", "woman"),
	("media", "media"),
	("data", "data"),
	("news", "news"),
	("series", "series"),
	("status", "status"),
];

/// Singular form of the last word of a snake_case table name.
///
/// Only the trailing segment is inflected, so `upload_files` becomes
/// `upload_file` and `categories` becomes `category`.
///
/// # Examples
///
/// ```
/// use lattice_core::naming::singularize;
///
/// assert_eq!(singularize("articles"), "article");
/// assert_eq!(singularize("categories"), "category");
/// assert_eq!(singularize("upload_file"), "upload_file");
/// assert_eq!(singularize("addresses"), "address");
/// ```
pub fn singularize(name: &str) -> String {
	let (prefix, word) = match name.rfind('_') {
		Some(idx) => name.split_at(idx + 1),
		None => ("", name),
	};
	format!("{}{}", prefix, singular_word(word))
}

fn singular_word(word: &str) -> String {
	let lower = word.to_lowercase();
	if let Some((_, singular)) = IRREGULAR.iter().find(|(plural, _)| *plural == lower) {
		return (*singular).to_string();
	}
	if lower.len() <= 2 || lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is")
	{
		return word.to_string();
	}
	if let Some(stem) = word.strip_suffix("ies") {
		return format!("{}y", stem);
	}
	for suffix in ["sses", "xes", "zes", "ches", "shes"] {
		if word.ends_with(suffix) {
			return word[..word.len() - 2].to_string();
		}
	}
	match word.strip_suffix('s') {
		Some(stem) => stem.to_string(),
		None => word.to_string(),
	}
}
