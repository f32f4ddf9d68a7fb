use std::collections::HashSet;
use std::path::Path;

use crate::WeftError;
use crate::WeftResult;
use crate::frontmatter::FrontmatterRecord;

/// Render a fragment through minijinja using the page's frontmatter record
/// as context. If the record is empty or the fragment has no template
/// syntax, the fragment is returned unchanged.
pub(crate) fn render_fragment(
	path: &Path,
	fragment: &str,
	record: &FrontmatterRecord,
) -> WeftResult<String> {
	if record.is_empty() || !has_template_syntax(fragment) {
		return Ok(fragment.to_string());
	}

	let mut env = minijinja::Environment::new();
	env.set_keep_trailing_newline(true);
	env.set_undefined_behavior(minijinja::UndefinedBehavior::Chainable);
	env
		.add_template("__fragment__", fragment)
		.map_err(|e| render_failed(path, &e))?;

	let template = env
		.get_template("__fragment__")
		.map_err(|e| render_failed(path, &e))?;

	let ctx = minijinja::Value::from_serialize(record.fields());
	template.render(ctx).map_err(|e| render_failed(path, &e))
}

fn render_failed(path: &Path, error: &minijinja::Error) -> WeftError {
	WeftError::RenderFailed {
		path: path.to_path_buf(),
		reason: error.to_string(),
	}
}

/// Find frontmatter keys referenced in `fragment` that the record does not
/// define. Uses minijinja's static analysis, so detection does not depend
/// on runtime control flow. Returns an empty `Vec` when the record is
/// empty (rendering is a no-op then) or the fragment has no template
/// syntax.
pub(crate) fn find_undefined_variables(
	fragment: &str,
	record: &FrontmatterRecord,
) -> Vec<String> {
	if record.is_empty() || !has_template_syntax(fragment) {
		return Vec::new();
	}

	let mut env = minijinja::Environment::new();
	env.set_keep_trailing_newline(true);
	let Ok(()) = env.add_template("__fragment__", fragment) else {
		return Vec::new();
	};
	let Ok(template) = env.get_template("__fragment__") else {
		return Vec::new();
	};

	let undeclared: HashSet<String> = template.undeclared_variables(true);
	let defined: HashSet<&str> = record.fields().keys().map(String::as_str).collect();

	let mut undefined: Vec<String> = undeclared
		.into_iter()
		.filter(|var| {
			let top_level = var.split('.').next().unwrap_or(var);
			!defined.contains(top_level) && !is_builtin_variable(top_level)
		})
		.collect();

	undefined.sort();
	undefined
}

/// Check whether a variable name is a minijinja builtin that should not
/// trigger an "undefined variable" warning.
fn is_builtin_variable(name: &str) -> bool {
	matches!(
		name,
		"loop" | "self" | "super" | "true" | "false" | "none" | "namespace" | "range" | "dict"
	)
}

/// Check whether a fragment contains minijinja template syntax.
pub(crate) fn has_template_syntax(fragment: &str) -> bool {
	fragment.contains("{{") || fragment.contains("{%") || fragment.contains("{#")
}
