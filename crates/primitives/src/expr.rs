//! Embedded expressions attached to parameters.
//!
//! Two forms are understood:
//!
//! * `#{name}` as the whole expression looks up a bean by name and yields it
//!   unchanged (or null when absent).
//! * Anything else is a string template where each `${key}` or
//!   `${key:default}` placeholder is replaced by a configuration property.

use crate::value::{Value, value};

/// Failure to evaluate an embedded expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
	#[error("unterminated placeholder in expression {expression:?}")]
	Unterminated { expression: String },
	#[error("empty placeholder in expression {expression:?}")]
	EmptyKey { expression: String },
	#[error("unknown property {key:?}")]
	UnknownProperty { key: String },
}

/// Evaluates `expression` using `property` for `${}` placeholders and `bean`
/// for a whole-expression `#{}` reference.
pub fn evaluate<P, B>(expression: &str, property: P, bean: B) -> Result<Option<Value>, ExpressionError>
where
	P: Fn(&str) -> Option<String>,
	B: Fn(&str) -> Option<Value>,
{
	let trimmed = expression.trim();
	if let Some(inner) = trimmed.strip_prefix("#{").and_then(|rest| rest.strip_suffix('}')) {
		let name = inner.trim();
		if name.is_empty() {
			return Err(ExpressionError::EmptyKey {
				expression: expression.to_string(),
			});
		}
		return Ok(bean(name));
	}

	interpolate(expression, property).map(|s| Some(value(s)))
}

fn interpolate<P>(expression: &str, property: P) -> Result<String, ExpressionError>
where
	P: Fn(&str) -> Option<String>,
{
	let mut out = String::with_capacity(expression.len());
	let mut rest = expression;

	while let Some(start) = rest.find("${") {
		out.push_str(&rest[..start]);
		let after = &rest[start + 2..];
		let Some(end) = after.find('}') else {
			return Err(ExpressionError::Unterminated {
				expression: expression.to_string(),
			});
		};

		let body = &after[..end];
		let (key, default) = match body.split_once(':') {
			Some((key, default)) => (key.trim(), Some(default)),
			None => (body.trim(), None),
		};
		if key.is_empty() {
			return Err(ExpressionError::EmptyKey {
				expression: expression.to_string(),
			});
		}

		match property(key).or_else(|| default.map(str::to_string)) {
			Some(resolved) => out.push_str(&resolved),
			None => return Err(ExpressionError::UnknownProperty { key: key.to_string() }),
		}
		rest = &after[end + 1..];
	}

	out.push_str(rest);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn props() -> HashMap<&'static str, &'static str> {
		HashMap::from([("app.name", "Folio"), ("undo.limit", "50")])
	}

	fn eval(expression: &str) -> Result<Option<Value>, ExpressionError> {
		let props = props();
		evaluate(
			expression,
			|k| props.get(k).map(|v| v.to_string()),
			|name| (name == "greeting").then(|| value(String::from("hello"))),
		)
	}

	fn eval_string(expression: &str) -> String {
		let v = eval(expression).unwrap().unwrap();
		v.downcast::<String>().unwrap().as_ref().clone()
	}

	#[test]
	fn placeholders_are_interpolated() {
		assert_eq!(eval_string("${app.name} keeps ${undo.limit} edits"), "Folio keeps 50 edits");
	}

	#[test]
	fn default_applies_to_missing_property() {
		assert_eq!(eval_string("${window.title:Untitled}"), "Untitled");
	}

	#[test]
	fn missing_property_without_default_fails() {
		assert_eq!(
			eval("${nope}").unwrap_err(),
			ExpressionError::UnknownProperty { key: "nope".into() }
		);
	}

	#[test]
	fn bean_reference_yields_bean_or_null() {
		assert!(eval("#{greeting}").unwrap().is_some());
		assert!(eval("#{absent}").unwrap().is_none());
	}

	#[test]
	fn unterminated_placeholder_fails() {
		assert!(matches!(eval("${app.name"), Err(ExpressionError::Unterminated { .. })));
	}
}
