use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use rstest::rstest;
use similar_asserts::assert_eq;

use super::__fixtures::*;
use super::*;
use crate::frontmatter::extract;
use crate::node::NodePiece;
use crate::resolver::resolve;
use crate::resolver::resolve_with;
use crate::template::Fragment;

fn parse_template(source: &str) -> WeftResult<Template> {
	Template::parse("layouts/test.html", source)
}

fn page_node(text: &str) -> Arc<ContentNode> {
	Arc::new(ContentNode::text(text))
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

#[test]
fn extract_without_block_yields_empty_record() -> WeftResult<()> {
	let extracted = extract(Path::new("page.html"), "<p>plain</p>\n")?;
	assert!(extracted.record.is_empty());
	assert_eq!(extracted.body, "<p>plain</p>\n");
	assert_eq!(extracted.body_start.line, 1);

	Ok(())
}

#[test]
fn extract_parses_scalars_lists_and_nested_maps() -> WeftResult<()> {
	let source = "---\ntitle: Hello\ntags: [a, b]\nauthor:\n  name: Jo\n---\nbody\n";
	let extracted = extract(Path::new("page.html"), source)?;

	assert_eq!(
		extracted.record.get("title"),
		Some(&serde_json::json!("Hello"))
	);
	assert_eq!(
		extracted.record.get("tags"),
		Some(&serde_json::json!(["a", "b"]))
	);
	assert_eq!(
		extracted.record.get("author"),
		Some(&serde_json::json!({ "name": "Jo" }))
	);
	assert_eq!(extracted.body, "body\n");
	assert_eq!(extracted.body_start.line, 7);

	Ok(())
}

#[test]
fn extract_missing_terminator_fails_without_partial_record() {
	let source = "---\ntitle: Hello\nbody without terminator\n";
	let result = extract(Path::new("page.html"), source);
	assert!(matches!(
		result,
		Err(WeftError::MissingFrontmatterTerminator { .. })
	));
}

#[rstest]
#[case::reserved_content("---\ncontent: nope\n---\n")]
#[case::non_string_layout("---\nlayout: [not, a, path]\n---\n")]
#[case::non_mapping("---\n- just\n- a\n- list\n---\n")]
fn extract_rejects_malformed_blocks(#[case] source: &str) {
	let result = extract(Path::new("page.html"), source);
	assert!(matches!(
		result,
		Err(WeftError::MalformedFrontmatter { .. })
	));
}

#[test]
fn extract_empty_block_is_empty_record() -> WeftResult<()> {
	let extracted = extract(Path::new("page.html"), "---\n---\nbody\n")?;
	assert!(extracted.record.is_empty());
	assert_eq!(extracted.body, "body\n");

	Ok(())
}

#[test]
fn record_layout_accessor_reads_reserved_key() -> WeftResult<()> {
	let extracted = extract(
		Path::new("page.html"),
		"---\nlayout: layouts/base.html\n---\n",
	)?;
	assert_eq!(extracted.record.layout(), Some("layouts/base.html"));
	assert_eq!(extracted.record.content(), None);

	Ok(())
}

// ---------------------------------------------------------------------------
// Template parsing
// ---------------------------------------------------------------------------

#[test]
fn parse_base_layout_structure() -> WeftResult<()> {
	let template = Template::parse("layouts/base.html", base_layout())?;

	assert_eq!(template.imports(), ["styles/base.css"]);
	assert!(template.has_slot("head"));
	assert!(template.has_slot(""));
	assert!(!template.has_slot("missing"));

	let slots: Vec<&str> = template
		.fragments()
		.iter()
		.filter_map(|fragment| {
			match fragment {
				Fragment::Slot(marker) => Some(marker.name.as_str()),
				Fragment::Static(_) => None,
			}
		})
		.collect();
	assert_eq!(slots, ["head", ""]);

	Ok(())
}

#[test]
fn parse_template_with_no_slots() -> WeftResult<()> {
	let template = parse_template("<p>static only</p>\n")?;
	assert!(!template.has_slots());
	assert_eq!(template.fragments().len(), 1);

	Ok(())
}

#[test]
fn parse_slot_fallback_content() -> WeftResult<()> {
	let template = parse_template("<slot name=\"head\"><title>Default</title></slot>")?;

	let Fragment::Slot(marker) = &template.fragments()[0] else {
		panic!("expected a slot fragment");
	};
	assert_eq!(marker.name, "head");
	assert_eq!(marker.fallback.as_deref(), Some("<title>Default</title>"));

	Ok(())
}

#[test]
fn parse_layout_frontmatter_declares_wrapping_layout() -> WeftResult<()> {
	let template = Template::parse("layouts/post.html", post_layout())?;
	assert_eq!(template.layout(), Some("layouts/base.html"));
	assert_eq!(template.imports(), ["styles/post.css"]);

	Ok(())
}

#[test]
fn parse_duplicate_default_slot_fails() {
	let result = parse_template("<slot />middle<slot />");
	assert!(matches!(
		result,
		Err(WeftError::DuplicateDefaultSlot { .. })
	));
}

#[test]
fn parse_duplicate_slot_name_fails() {
	let result = parse_template("<slot name=\"head\" /><slot name=\"head\" />");
	assert!(matches!(
		result,
		Err(WeftError::DuplicateSlotName { ref name, .. }) if name == "head"
	));
}

#[test]
fn parse_unterminated_tag_fails() {
	let result = parse_template("before <slot name=\"head\"");
	assert!(matches!(result, Err(WeftError::UnterminatedTag { .. })));
}

#[test]
fn parse_unclosed_slot_fails() {
	let result = parse_template("<slot name=\"head\">fallback without close");
	assert!(matches!(
		result,
		Err(WeftError::UnclosedSlot { ref name, .. }) if name == "head"
	));
}

#[rstest]
#[case::unknown_attribute("<slot foo=\"bar\" />")]
#[case::missing_equals("<slot name \"head\" />")]
#[case::unquoted_value("<slot name=head />")]
#[case::import_without_src("<import />")]
fn parse_malformed_tags_fail(#[case] source: &str) {
	let result = parse_template(source);
	assert!(matches!(result, Err(WeftError::MalformedTag { .. })));
}

#[rstest]
#[case::lookalike_element("<slotted>content</slotted>")]
#[case::import_lookalike("<importer>x</importer>")]
#[case::stray_close_tag("no open tag </slot> here")]
#[case::stray_self_close("just /> text")]
fn parse_lookalikes_stay_static(#[case] source: &str) -> WeftResult<()> {
	let template = parse_template(source)?;
	assert!(!template.has_slots());
	assert_eq!(template.fragments(), &[Fragment::Static(source.to_string())]);

	Ok(())
}

#[test]
fn parse_is_idempotent() -> WeftResult<()> {
	let first = Template::parse("layouts/base.html", base_layout())?;
	let second = Template::parse("layouts/base.html", base_layout())?;
	assert_eq!(first, second);

	Ok(())
}

#[test]
fn parse_tracks_marker_positions_past_frontmatter() -> WeftResult<()> {
	let source = "---\ntitle: x\n---\nline one\n<slot />\n";
	let template = parse_template(source)?;

	let Some(Fragment::Slot(marker)) = template
		.fragments()
		.iter()
		.find(|fragment| matches!(fragment, Fragment::Slot(_)))
	else {
		panic!("expected a slot fragment");
	};
	// Frontmatter occupies lines 1-3, body starts on line 4.
	assert_eq!(marker.position.start.line, 5);
	assert_eq!(marker.position.start.column, 1);

	Ok(())
}

// ---------------------------------------------------------------------------
// Slot resolution
// ---------------------------------------------------------------------------

#[test]
fn resolve_no_slot_template_ignores_supplied_content() -> WeftResult<()> {
	let template = parse_template("<p>static only</p>\n")?;
	let supplied = SlotContent::with_default(page_node("ignored"));
	let resolved = resolve(&template, &supplied)?;

	assert_eq!(resolved.node.to_string(), "<p>static only</p>\n");
	assert!(resolved.warnings.is_empty());

	Ok(())
}

#[test]
fn resolve_round_trip_places_body_once_at_marker() -> WeftResult<()> {
	let template = parse_template("before[<slot />]after")?;
	let supplied = SlotContent::with_default(page_node("BODY"));
	let resolved = resolve(&template, &supplied)?;

	assert_eq!(resolved.node.to_string(), "before[BODY]after");

	Ok(())
}

#[test]
fn resolve_named_slot_without_content_is_empty() -> WeftResult<()> {
	// Scenario: named `head` slot plus default slot, only default supplied.
	let template = Template::parse("layouts/base.html", base_layout())?;
	let supplied = SlotContent::with_default(page_node("<p>Hi!</p>"));
	let resolved = resolve(&template, &supplied)?;

	let output = resolved.node.to_string();
	assert!(output.contains("<head></head>"));
	assert!(output.contains("<body><p>Hi!</p></body>"));
	assert!(resolved.warnings.is_empty());

	Ok(())
}

#[test]
fn resolve_uses_fallback_when_nothing_supplied() -> WeftResult<()> {
	let template = parse_template("<slot name=\"head\"><title>Default</title></slot>")?;
	let resolved = resolve(&template, &SlotContent::new())?;

	assert_eq!(resolved.node.to_string(), "<title>Default</title>");

	Ok(())
}

#[test]
fn resolve_supplied_content_wins_over_fallback() -> WeftResult<()> {
	let template = parse_template("<slot name=\"head\"><title>Default</title></slot>")?;
	let mut supplied = SlotContent::new();
	supplied.insert("head", page_node("<title>Mine</title>"));
	let resolved = resolve(&template, &supplied)?;

	assert_eq!(resolved.node.to_string(), "<title>Mine</title>");

	Ok(())
}

#[test]
fn resolve_unmatched_named_entry_warns_without_aborting() -> WeftResult<()> {
	let template = parse_template("only [<slot />] here")?;
	let mut supplied = SlotContent::with_default(page_node("BODY"));
	supplied.insert("sidebar", page_node("<nav />"));
	let resolved = resolve(&template, &supplied)?;

	assert_eq!(resolved.node.to_string(), "only [BODY] here");
	assert_eq!(resolved.warnings.len(), 1);
	assert!(matches!(
		&resolved.warnings[0],
		ComposeWarning::UnmatchedSlotContent { slot, .. } if slot == "sidebar"
	));

	Ok(())
}

#[test]
fn resolve_substitutes_markers_in_document_order() -> WeftResult<()> {
	let template = parse_template("<slot name=\"a\" />|<slot name=\"b\" />")?;
	let mut supplied = SlotContent::new();
	supplied.insert("a", page_node("first"));
	supplied.insert("b", page_node("second"));
	let resolved = resolve(&template, &supplied)?;

	assert_eq!(resolved.node.to_string(), "first|second");

	Ok(())
}

#[test]
fn resolve_shares_supplied_nodes_instead_of_copying() -> WeftResult<()> {
	let template = parse_template("<slot />")?;
	let node = page_node("shared");
	let resolved = resolve(&template, &SlotContent::with_default(Arc::clone(&node)))?;

	let [NodePiece::Node(child)] = resolved.node.pieces() else {
		panic!("expected a single shared child node");
	};
	assert!(Arc::ptr_eq(child, &node));

	Ok(())
}

#[test]
fn resolve_with_interpolates_frontmatter() -> WeftResult<()> {
	let template = Template::parse("layouts/titled.html", titled_layout())?;
	let extracted = extract(Path::new("page.html"), "---\ntitle: Welcome\n---\n")?;
	let supplied = SlotContent::with_default(page_node("body"));
	let resolved = resolve_with(&template, &supplied, &extracted.record)?;

	assert_eq!(
		resolved.node.to_string(),
		"<h1>Welcome</h1>\n<main>body</main>\n"
	);
	assert!(resolved.warnings.is_empty());

	Ok(())
}

#[test]
fn resolve_with_collects_undefined_variable_warnings() -> WeftResult<()> {
	let template = parse_template("<h1>{{ missing.key }}</h1><slot />")?;
	let extracted = extract(Path::new("page.html"), "---\ntitle: x\n---\n")?;
	let supplied = SlotContent::with_default(page_node("body"));
	let resolved = resolve_with(&template, &supplied, &extracted.record)?;

	assert_eq!(resolved.warnings.len(), 1);
	assert!(matches!(
		&resolved.warnings[0],
		ComposeWarning::UndefinedVariables { variables, .. }
			if variables == &["missing.key".to_string()]
	));

	Ok(())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[test]
fn registry_register_and_lookup() -> WeftResult<()> {
	let registry = TemplateRegistry::new();
	registry.register("layouts/base.html", base_layout())?;

	let template = registry.lookup(Path::new("layouts/base.html"));
	assert!(template.is_some());
	assert!(registry.lookup(Path::new("layouts/other.html")).is_none());

	Ok(())
}

#[test]
fn registry_reregistration_is_idempotent() -> WeftResult<()> {
	let registry = TemplateRegistry::new();
	let first = registry.register("layouts/base.html", base_layout())?;
	let second = registry.register("layouts/base.html", base_layout())?;

	assert_eq!(*first, *second);
	assert_eq!(registry.len(), 1);

	Ok(())
}

#[test]
fn registry_reregistration_overwrites() -> WeftResult<()> {
	let registry = TemplateRegistry::new();
	registry.register("layouts/base.html", "old <slot />")?;
	registry.register("layouts/base.html", "new <slot />")?;

	let template = registry
		.lookup(Path::new("layouts/base.html"))
		.expect("registered");
	assert!(matches!(
		&template.fragments()[0],
		Fragment::Static(text) if text == "new "
	));

	Ok(())
}

#[test]
fn registry_get_or_load_caches_loaded_templates() -> WeftResult<()> {
	let registry = TemplateRegistry::new();
	let loader = fixture_loader();

	let loaded = registry.get_or_load(Path::new("layouts/base.html"), &loader)?;
	assert!(loaded.is_some());

	// A second lookup must be served from the cache: an empty loader
	// cannot satisfy it otherwise.
	let empty = MemoryLoader::new();
	let cached = registry.get_or_load(Path::new("layouts/base.html"), &empty)?;
	assert!(cached.is_some());

	Ok(())
}

#[test]
fn registry_get_or_load_missing_source_is_none() -> WeftResult<()> {
	let registry = TemplateRegistry::new();
	let loader = MemoryLoader::new();

	let loaded = registry.get_or_load(Path::new("missing.file"), &loader)?;
	assert!(loaded.is_none());

	Ok(())
}

#[test]
fn registry_invalidate_and_clear() -> WeftResult<()> {
	let registry = fixture_registry();
	assert_eq!(registry.len(), 2);

	assert!(registry.invalidate(Path::new("layouts/base.html")));
	assert!(!registry.invalidate(Path::new("layouts/base.html")));
	assert_eq!(registry.len(), 1);

	registry.clear();
	assert!(registry.is_empty());

	Ok(())
}

#[test]
fn registry_preload_skips_missing_sources() -> WeftResult<()> {
	let registry = TemplateRegistry::new();
	let loader = fixture_loader();

	let registered = registry.preload(
		&loader,
		[
			PathBuf::from("layouts/base.html"),
			PathBuf::from("layouts/missing.html"),
			PathBuf::from("layouts/post.html"),
		],
	)?;

	assert_eq!(registered, 2);
	assert_eq!(registry.len(), 2);

	Ok(())
}

#[test]
fn registry_concurrent_same_id_registration_is_consistent() {
	let registry = TemplateRegistry::new();

	std::thread::scope(|scope| {
		for _ in 0..8 {
			scope.spawn(|| {
				for _ in 0..50 {
					registry
						.register("layouts/base.html", base_layout())
						.expect("registration succeeds");
					let _ = registry.lookup(Path::new("layouts/base.html"));
				}
			});
		}
	});

	assert_eq!(registry.len(), 1);
	let template = registry
		.lookup(Path::new("layouts/base.html"))
		.expect("registered");
	assert_eq!(template.imports(), ["styles/base.css"]);
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn compose_fixture(page_source: &str) -> Result<ComposedPage, PageError> {
	compose_page(
		Path::new("index.html"),
		page_source,
		&fixture_registry(),
		&MemoryLoader::new(),
		&CancelToken::new(),
	)
}

#[test]
fn compose_self_contained_page() -> Result<(), PageError> {
	let composed = compose_fixture("<p>plain</p>\n")?;

	assert_eq!(composed.node.to_string(), "<p>plain</p>\n");
	assert!(composed.imports.is_empty());
	assert!(composed.warnings.is_empty());
	assert_eq!(composed.frontmatter.content(), Some("<p>plain</p>\n"));

	Ok(())
}

#[test]
fn compose_single_layout_round_trip() -> Result<(), PageError> {
	let composed = compose_fixture(base_page())?;

	let output = composed.node.to_string();
	// The body appears exactly once, where the default marker sat.
	assert_eq!(output.matches("<p>Hi!</p>").count(), 1);
	assert!(output.contains("<body><p>Hi!</p>\n</body>"));
	assert!(output.contains("<head></head>"));
	assert_eq!(composed.imports, ["styles/base.css"]);
	assert!(composed.warnings.is_empty());

	Ok(())
}

#[test]
fn compose_nested_chain_resolves_every_link() -> Result<(), PageError> {
	let page = "---\nlayout: layouts/post.html\n---\n<p>content</p>\n";
	let composed = compose_fixture(page)?;

	let output = composed.node.to_string();
	assert!(output.contains("<article><p>content</p>\n</article>"));
	assert!(output.contains("<html>"));
	// Outermost template's imports come first; document order within each.
	assert_eq!(composed.imports, ["styles/base.css", "styles/post.css"]);

	Ok(())
}

#[test]
fn compose_propagates_frontmatter_to_every_link() -> Result<(), PageError> {
	let registry = TemplateRegistry::new();
	registry
		.register("layouts/titled.html", titled_layout())
		.expect("layout parses");

	let page = "---\nlayout: layouts/titled.html\ntitle: Welcome\n---\n<p>{{ title }}</p>\n";
	let composed = compose_page(
		Path::new("index.html"),
		page,
		&registry,
		&MemoryLoader::new(),
		&CancelToken::new(),
	)?;

	assert_eq!(
		composed.node.to_string(),
		"<h1>Welcome</h1>\n<main><p>Welcome</p>\n</main>\n"
	);
	assert_eq!(composed.frontmatter.content(), Some("<p>Welcome</p>\n"));

	Ok(())
}

#[test]
fn compose_cycle_fails_before_rendering() {
	let registry = TemplateRegistry::new();
	registry
		.register(
			"layouts/post.html",
			"---\nlayout: layouts/base.html\n---\n<slot />",
		)
		.expect("layout parses");
	registry
		.register(
			"layouts/base.html",
			"---\nlayout: layouts/post.html\n---\n<slot />",
		)
		.expect("layout parses");

	let page = "---\nlayout: layouts/post.html\n---\nbody\n";
	let error = compose_page(
		Path::new("index.html"),
		page,
		&registry,
		&MemoryLoader::new(),
		&CancelToken::new(),
	)
	.expect_err("cycle must fail");

	assert_eq!(error.stage, Stage::LayoutResolving);
	let WeftError::LayoutCycle { layout, chain } = &error.error else {
		panic!("expected a layout cycle, got: {}", error.error);
	};
	assert_eq!(layout, Path::new("layouts/post.html"));
	assert_eq!(
		chain,
		&[
			PathBuf::from("layouts/post.html"),
			PathBuf::from("layouts/base.html"),
		]
	);
}

#[test]
fn compose_missing_layout_fails_with_its_identifier() {
	let error = compose_fixture("---\nlayout: missing.file\n---\nbody\n")
		.expect_err("missing layout must fail");

	assert!(matches!(
		&error.error,
		WeftError::LayoutNotFound { layout, .. } if layout == Path::new("missing.file")
	));
	assert_eq!(error.page, PathBuf::from("index.html"));
}

#[test]
fn compose_unterminated_frontmatter_fails_at_load() {
	let error =
		compose_fixture("---\ntitle: Hello\nno terminator\n").expect_err("must fail to parse");

	assert_eq!(error.stage, Stage::Loaded);
	assert!(matches!(
		error.error,
		WeftError::MissingFrontmatterTerminator { .. }
	));
}

#[test]
fn compose_collects_undefined_variable_warnings() -> Result<(), PageError> {
	let registry = TemplateRegistry::new();
	registry
		.register("layouts/titled.html", titled_layout())
		.expect("layout parses");

	// The page defines no `title`, so the layout's reference is undefined.
	let page = "---\nlayout: layouts/titled.html\nauthor: Jo\n---\nbody\n";
	let composed = compose_page(
		Path::new("index.html"),
		page,
		&registry,
		&MemoryLoader::new(),
		&CancelToken::new(),
	)?;

	assert_eq!(composed.warnings.len(), 1);
	assert!(matches!(
		&composed.warnings[0],
		ComposeWarning::UndefinedVariables { variables, .. }
			if variables == &["title".to_string()]
	));

	Ok(())
}

#[test]
fn compose_loads_layouts_through_the_loader_on_cache_miss() -> Result<(), PageError> {
	let registry = TemplateRegistry::new();
	let loader = fixture_loader();

	let composed = compose_page(
		Path::new("index.html"),
		base_page(),
		&registry,
		&loader,
		&CancelToken::new(),
	)?;

	assert!(composed.node.to_string().contains("<p>Hi!</p>"));
	// The chain resolution registered the layout for later pages.
	assert!(registry.lookup(Path::new("layouts/base.html")).is_some());

	Ok(())
}

#[test]
fn compose_cancelled_build_emits_nothing() {
	let cancel = CancelToken::new();
	cancel.cancel();

	let error = compose_page(
		Path::new("index.html"),
		base_page(),
		&fixture_registry(),
		&MemoryLoader::new(),
		&cancel,
	)
	.expect_err("cancelled build must not emit");

	assert!(matches!(error.error, WeftError::Cancelled { .. }));
}

// ---------------------------------------------------------------------------
// Parallel build
// ---------------------------------------------------------------------------

fn site_loader() -> MemoryLoader {
	let mut loader = fixture_loader();
	loader.insert("index.html", base_page());
	loader.insert(
		"posts/first.html",
		"---\nlayout: layouts/post.html\n---\n<p>first</p>\n",
	);
	loader.insert("broken.html", "---\nlayout: missing.file\n---\nbody\n");
	loader
}

fn site_pages() -> Vec<PathBuf> {
	vec![
		PathBuf::from("broken.html"),
		PathBuf::from("index.html"),
		PathBuf::from("posts/first.html"),
	]
}

#[test]
fn compose_all_isolates_page_failures() {
	let registry = TemplateRegistry::new();
	let loader = site_loader();
	let pages = site_pages();

	let report = compose_all(
		&pages,
		&registry,
		&loader,
		&BuildOptions::default(),
		&CancelToken::new(),
	);

	assert!(!report.is_ok());
	assert_eq!(report.composed_count(), 2);
	assert_eq!(report.failed_count(), 1);

	// Outcomes keep the order the pages were given.
	assert!(report.outcomes[0].is_err());
	assert!(report.outcomes[1].is_ok());
	assert!(report.outcomes[2].is_ok());

	let failure = report.failed().next().expect("one failure");
	assert_eq!(failure.page, PathBuf::from("broken.html"));
	assert!(matches!(failure.error, WeftError::LayoutNotFound { .. }));
}

#[test]
fn compose_all_with_bounded_parallelism() {
	let registry = TemplateRegistry::new();
	let loader = site_loader();
	let pages = vec![PathBuf::from("index.html"), PathBuf::from("posts/first.html")];

	let options = BuildOptions {
		parallelism: 2,
		..BuildOptions::default()
	};
	let report = compose_all(&pages, &registry, &loader, &options, &CancelToken::new());

	assert!(report.is_ok());
	assert_eq!(report.composed_count(), 2);
}

#[test]
fn compose_all_cancelled_before_start_composes_nothing() {
	let registry = TemplateRegistry::new();
	let loader = site_loader();
	let pages = site_pages();
	let cancel = CancelToken::new();
	cancel.cancel();

	let report = compose_all(
		&pages,
		&registry,
		&loader,
		&BuildOptions::default(),
		&cancel,
	);

	assert_eq!(report.composed_count(), 0);
	assert!(report
		.failed()
		.all(|failure| matches!(failure.error, WeftError::Cancelled { .. })));
}

#[test]
fn compose_all_missing_page_is_an_isolated_failure() {
	let registry = fixture_registry();
	let mut loader = MemoryLoader::new();
	loader.insert("index.html", base_page());
	let pages = vec![PathBuf::from("index.html"), PathBuf::from("gone.html")];

	let report = compose_all(
		&pages,
		&registry,
		&loader,
		&BuildOptions::default(),
		&CancelToken::new(),
	);

	assert_eq!(report.composed_count(), 1);
	assert_eq!(report.failed_count(), 1);
}

// ---------------------------------------------------------------------------
// Discovery, loader, and config
// ---------------------------------------------------------------------------

fn write_file(root: &Path, rel: &str, content: &str) {
	let path = root.join(rel);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).expect("create parent dirs");
	}
	std::fs::write(path, content).expect("write file");
}

#[test]
fn discover_pages_skips_layouts_hidden_and_excluded() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	let root = dir.path();
	write_file(root, "index.html", "x");
	write_file(root, "posts/first.md", "x");
	write_file(root, "posts/draft.swp", "x");
	write_file(root, "layouts/base.html", "x");
	write_file(root, ".cache/stale.html", "x");
	write_file(root, "notes.txt", "x");

	let options = BuildOptions {
		exclude_patterns: vec!["*.swp".to_string()],
		..BuildOptions::default()
	};
	let pages = discover_pages(root, &options)?;

	assert_eq!(
		pages,
		[PathBuf::from("index.html"), PathBuf::from("posts/first.md")]
	);

	Ok(())
}

#[test]
fn discover_pages_include_patterns_add_files() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	let root = dir.path();
	write_file(root, "index.html", "x");
	write_file(root, "feed.xml", "x");

	let config: WeftConfig =
		toml::from_str("[pages]\ninclude = [\"*.xml\"]\n").expect("config parses");
	let options = BuildOptions::from_config(Some(&config));
	let pages = discover_pages(root, &options)?;

	assert_eq!(
		pages,
		[PathBuf::from("feed.xml"), PathBuf::from("index.html")]
	);

	Ok(())
}

#[test]
fn discover_layouts_returns_root_relative_ids() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	let root = dir.path();
	write_file(root, "layouts/base.html", base_layout());
	write_file(root, "layouts/partials/head.html", "<slot />");
	write_file(root, "index.html", "x");

	let layouts = discover_layouts(root, Path::new("layouts"))?;
	assert_eq!(
		layouts,
		[
			PathBuf::from("layouts/base.html"),
			PathBuf::from("layouts/partials/head.html"),
		]
	);

	Ok(())
}

#[test]
fn fs_loader_round_trip_and_missing() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	let root = dir.path();
	write_file(root, "page.html", "line one\r\nline two\r\n");

	let loader = FsLoader::new(root);
	let loaded = loader.load(Path::new("page.html"))?;
	assert_eq!(loaded.as_deref(), Some("line one\nline two\n"));
	assert!(loader.load(Path::new("missing.html"))?.is_none());

	Ok(())
}

#[test]
fn fs_loader_enforces_size_limit() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	let root = dir.path();
	write_file(root, "big.html", "0123456789");

	let loader = FsLoader::new(root).with_max_file_size(4);
	let result = loader.load(Path::new("big.html"));
	assert!(matches!(result, Err(WeftError::FileTooLarge { .. })));

	Ok(())
}

#[test]
fn config_loads_first_candidate_and_defaults() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	let root = dir.path();
	write_file(
		root,
		"weft.toml",
		"parallelism = 4\n\n[layouts]\ndir = \"templates\"\n\n[exclude]\npatterns = \
		 [\"drafts/\"]\n",
	);

	let config = WeftConfig::load(root)?.expect("config file present");
	assert_eq!(config.layouts.dir, PathBuf::from("templates"));
	assert_eq!(config.exclude.patterns, ["drafts/"]);
	assert_eq!(config.parallelism, 4);
	// Untouched sections keep their defaults.
	assert_eq!(config.pages.extensions, ["html", "md"]);
	assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);

	Ok(())
}

#[test]
fn config_missing_file_is_none() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	assert!(WeftConfig::load(dir.path())?.is_none());

	Ok(())
}

#[test]
fn config_malformed_toml_fails() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	write_file(dir.path(), "weft.toml", "[layouts\ndir = ");

	let result = WeftConfig::load(dir.path());
	assert!(matches!(result, Err(WeftError::ConfigParse(_))));

	Ok(())
}

#[test]
fn preload_discovered_layouts_then_compose_offline() -> WeftResult<()> {
	let dir = tempfile::tempdir()?;
	let root = dir.path();
	write_file(root, "layouts/base.html", base_layout());
	write_file(root, "index.html", base_page());

	let loader = FsLoader::new(root);
	let registry = TemplateRegistry::new();
	let layouts = discover_layouts(root, Path::new("layouts"))?;
	let registered = registry.preload(&loader, layouts)?;
	assert_eq!(registered, 1);

	// With the registry warm, composition succeeds against an empty loader.
	let composed = compose_page(
		Path::new("index.html"),
		base_page(),
		&registry,
		&MemoryLoader::new(),
		&CancelToken::new(),
	)
	.expect("composes from the warm registry");
	assert!(composed.node.to_string().contains("<p>Hi!</p>"));

	Ok(())
}
