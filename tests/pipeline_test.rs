//! End-to-end tests for the conversion pipeline.

use structmd::model::{LinkTarget, NodeKind};
use structmd::{
    BBox, Converter, DocumentTree, JsonPageSource, PageInput, RawImage, RawSpan, WarningKind,
};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

fn body(text: &str) -> RawSpan {
    RawSpan::new(text, 12.0)
}

fn heading(text: &str, size: f32) -> RawSpan {
    RawSpan::new(text, size).with_bold(true)
}

#[test]
fn test_intro_scenario() {
    let page = PageInput::new(0)
        .with_span(heading("INTRO", 24.0))
        .with_span(body("Some body text."))
        .with_span(body("• First point"))
        .with_span(body("• Second point"));

    let result = Converter::new().convert(vec![page]).unwrap();

    assert_eq!(
        result.markdown,
        "# INTRO\n\nSome body text.\n\n- First point\n- Second point\n"
    );
    assert!(result.warnings.is_empty());
    assert_eq!(result.stats.heading_count, 1);
    assert_eq!(result.stats.list_item_count, 2);
}

#[test]
fn test_conversion_is_idempotent() {
    let pages = || {
        vec![
            PageInput::new(0)
                .with_span(heading("Report", 22.0))
                .with_span(body("An opening paragraph with enough words."))
                .with_image(RawImage::new(PNG.to_vec(), BBox::new(72.0, 200.0, 300.0, 400.0))),
            PageInput::new(1)
                .with_span(heading("Details", 16.0))
                .with_span(body("1. numbered entry"))
                .with_span(body("2. another entry")),
        ]
    };

    let first = Converter::new().convert(pages()).unwrap();
    let second = Converter::new().convert(pages()).unwrap();

    assert_eq!(first.markdown, second.markdown);
    let names = |r: &structmd::ConversionResult| {
        r.images
            .iter()
            .map(|i| i.relative_path.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
    assert_eq!(first.images.len(), 1);
}

fn check_heading_nesting(tree: &DocumentTree, parent_level: u8, ids: &[structmd::model::NodeId]) {
    for &id in ids {
        if let NodeKind::Heading { level, children, .. } = &tree.node(id).kind {
            assert!(
                *level > parent_level,
                "heading level {} nested under level {}",
                level,
                parent_level
            );
            check_heading_nesting(tree, *level, children);
        }
    }
}

#[test]
fn test_heading_monotonicity() {
    let page = PageInput::new(0)
        .with_span(heading("Part One", 24.0))
        .with_span(body("Opening text for the first part."))
        .with_span(heading("Deep Detail", 14.0))
        .with_span(body("Text that sits under the deep heading."))
        .with_span(heading("Section", 18.0))
        .with_span(body("Section text goes right here."))
        .with_span(heading("Part Two", 24.0))
        .with_span(body("Closing text for the second part."));

    let structure = Converter::new().structure(vec![page]).unwrap();
    let tree = &structure.tree;

    let outline = tree.outline();
    let levels: Vec<u8> = outline.iter().map(|(level, _)| *level).collect();
    assert_eq!(levels, vec![1, 3, 2, 1]);

    check_heading_nesting(tree, 0, tree.roots());

    let roots: Vec<_> = tree
        .roots()
        .iter()
        .filter(|&&id| tree.node(id).is_heading())
        .collect();
    assert_eq!(roots.len(), 2);
}

#[test]
fn test_list_nesting_clamps_jumps() {
    let page = PageInput::new(0)
        .with_span(body("- a"))
        .with_span(body("  - b"))
        .with_span(body("  - c"))
        .with_span(body("- d"))
        .with_span(body("    - e"));

    let result = Converter::new().convert(vec![page]).unwrap();
    assert_eq!(result.markdown, "- a\n  - b\n  - c\n- d\n  - e\n");
}

#[test]
fn test_outdented_item_keeps_numbering() {
    let page = PageInput::new(0)
        .with_span(body("- a"))
        .with_span(body("    1. b"))
        .with_span(body("  2. c"));

    let result = Converter::new().convert(vec![page]).unwrap();
    assert_eq!(result.markdown, "- a\n  1. b\n  2. c\n");
}

#[test]
fn test_identical_images_share_one_file() {
    let line = BBox::new(72.0, 72.0, 400.0, 86.0);
    let figure = BBox::new(72.0, 100.0, 300.0, 300.0);
    let pages = vec![
        PageInput::new(0)
            .with_span(body("First page text goes here.").with_bbox(line))
            .with_image(RawImage::new(PNG.to_vec(), figure)),
        PageInput::new(1)
            .with_span(body("Second page text goes here.").with_bbox(line))
            .with_image(RawImage::new(PNG.to_vec(), figure)),
    ];

    let result = Converter::new().convert(pages).unwrap();

    assert_eq!(result.images.len(), 1);
    let path = &result.images[0].relative_path;
    assert!(path.starts_with("images/") && path.ends_with(".png"));
    assert_eq!(result.markdown.matches(path.as_str()).count(), 2);
    assert_eq!(result.stats.image_count, 2);
    assert_eq!(result.stats.image_file_count, 1);
}

#[test]
fn test_links_render_inline() {
    let page = PageInput::new(0)
        .with_span(body("Visit the project homepage."))
        .with_span(body("Jump ahead."))
        .with_link(0, LinkTarget::External {
            url: "https://example.com/docs".into(),
        })
        .with_link(1, LinkTarget::Page { page_index: 7 });

    let result = Converter::new().convert(vec![page]).unwrap();

    assert!(result
        .markdown
        .contains("[Visit the project homepage.](https://example.com/docs)"));
    assert!(result.markdown.contains("Jump ahead."));
    assert_eq!(
        result
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UnresolvedLinkTarget)
            .count(),
        1
    );
}

#[test]
fn test_malformed_spans_are_dropped_with_warning() {
    let page = PageInput::new(0)
        .with_span(body("Valid paragraph text."))
        .with_span(RawSpan::new("broken", f32::NAN))
        .with_span(RawSpan::new("   ", 12.0));

    let result = Converter::new().convert(vec![page]).unwrap();

    assert_eq!(result.markdown, "Valid paragraph text.\n");
    assert_eq!(result.stats.span_count, 1);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::MalformedSpanData);
}

#[test]
fn test_json_dump_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("paper.json");
    std::fs::write(
        &dump,
        r#"{
            "pages": [{
                "spans": [
                    {"text": "Abstract", "font_size": 20, "is_bold": true},
                    {"text": "We describe a method for structure recovery.", "font_size": 11}
                ],
                "images": [{"data": "iVBORw0KGgoAAAAN", "bbox": [72, 300, 500, 600]}]
            }]
        }"#,
    )
    .unwrap();

    let source = JsonPageSource::open(&dump).unwrap();
    let result = Converter::new().convert(source).unwrap();
    assert!(result
        .markdown
        .starts_with("# Abstract\n\nWe describe a method for structure recovery.\n"));
    assert_eq!(result.images.len(), 1);

    let out = dir.path().join("out");
    let md = result.write_to(&out, "paper").unwrap();
    assert_eq!(md, out.join("paper.md"));
    assert_eq!(std::fs::read_to_string(&md).unwrap(), result.markdown);
    assert!(out.join(&result.images[0].relative_path).is_file());
}

#[test]
fn test_analysis_serializes_roles() {
    let page = PageInput::new(0)
        .with_span(heading("Title", 24.0))
        .with_span(body("Plain paragraph content here."));

    let analysis = Converter::new().analyze(vec![page]).unwrap();
    let json = structmd::render::to_json(&analysis, structmd::JsonFormat::Compact).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["body_font_size"], 12.0);
    assert_eq!(value["spans"][0]["role"], "heading");
    assert_eq!(value["spans"][0]["level"], 1);
    assert_eq!(value["spans"][1]["role"], "paragraph");
    assert_eq!(value["spans"][1]["confidence"], "heuristic");
}
