use card_impose::*;
use card_template::{Color, DataRow, DocObject, ObjectKind, ShapeKind, TemplateDocument, TextAlign};

/// 100×60 design-space template: a full-canvas dark rectangle plus a
/// name placeholder.
fn test_template() -> TemplateDocument {
    TemplateDocument {
        objects: vec![
            DocObject {
                id: "bg".to_string(),
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 60.0,
                rotation: 0.0,
                field: None,
                frame_overlay: None,
                kind: ObjectKind::Shape {
                    shape: ShapeKind::Rect,
                    fill: Some(Color::rgb(40, 40, 40)),
                    stroke: None,
                    stroke_width: 0.0,
                },
            },
            DocObject {
                id: "name".to_string(),
                x: 5.0,
                y: 5.0,
                width: 90.0,
                height: 20.0,
                rotation: 0.0,
                field: Some("name".to_string()),
                frame_overlay: None,
                kind: ObjectKind::Text {
                    content: "{{name}}".to_string(),
                    font_size: 12.0,
                    font_family: None,
                    fill: Color::white(),
                    align: TextAlign::Left,
                },
            },
        ],
        ..TemplateDocument::new(100.0, 60.0)
    }
}

fn test_rows(count: usize) -> Vec<DataRow> {
    (0..count)
        .map(|i| {
            let mut row = DataRow::new();
            row.insert("name".to_string(), format!("Person {}", i + 1));
            row
        })
        .collect()
}

/// 2 rows × 3 cols of 20×10 mm cells at ~5 px/mm.
fn test_layout() -> PageLayout {
    PageLayout {
        page_size: PageSize::Custom {
            width_mm: 100.0,
            height_mm: 60.0,
        },
        dpi: 127.0, // 5 px per mm
        margins: Margins::uniform(5.0),
        h_spacing_mm: 2.0,
        v_spacing_mm: 2.0,
        cell_width_mm: Some(20.0),
        cell_height_mm: Some(10.0),
        rows_per_page: 2,
        cols_per_page: 3,
        ..Default::default()
    }
}

fn is_white(pixel: &image::Rgba<u8>) -> bool {
    pixel.0 == [255, 255, 255, 255]
}

#[tokio::test]
async fn test_seven_rows_fill_two_pages() {
    let template = test_template();
    let rows = test_rows(7);
    let layout = test_layout();
    let mut renderer = RasterRenderer::new(RenderOptions::default());

    let outcome = impose(
        &template,
        &rows,
        &layout,
        &mut renderer,
        &CancelHandle::new(),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(outcome.pages.len(), 2);
    assert!(outcome.warnings.is_empty());

    let resolved = layout.resolve();
    for page in &outcome.pages {
        assert_eq!(page.image.width(), resolved.page_width_px);
        assert_eq!(page.image.height(), resolved.page_height_px);
    }

    // Page 0 has all six cells inked; page 1 only the first
    let cell_center = |pos: GridPosition| {
        let (x, y) = resolved.cell_origin(pos);
        (
            x + resolved.cell_width_px / 2,
            y + resolved.cell_height_px / 2,
        )
    };

    let first = &outcome.pages[0].image;
    for slot in 0..6 {
        let (_, pos) = resolved.position_of(slot);
        let (x, y) = cell_center(pos);
        assert!(!is_white(first.get_pixel(x, y)), "page 0 slot {slot} empty");
    }

    let second = &outcome.pages[1].image;
    let (x, y) = cell_center(GridPosition::new(0, 0));
    assert!(!is_white(second.get_pixel(x, y)), "spill cell empty");
    for (row, col) in [(0, 1), (0, 2), (1, 0), (1, 1), (1, 2)] {
        let (x, y) = cell_center(GridPosition::new(row, col));
        assert!(
            is_white(second.get_pixel(x, y)),
            "cell ({row},{col}) on page 1 should be blank"
        );
    }
}

#[tokio::test]
async fn test_zero_rows_produce_zero_pages() {
    let template = test_template();
    let layout = test_layout();
    let mut renderer = RasterRenderer::new(RenderOptions::default());

    let outcome = impose(
        &template,
        &[],
        &layout,
        &mut renderer,
        &CancelHandle::new(),
        |_| {},
    )
    .await
    .unwrap();

    assert!(outcome.pages.is_empty());
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn test_updates_arrive_in_row_order() {
    let template = test_template();
    let rows = test_rows(7);
    let layout = test_layout();
    let mut renderer = RasterRenderer::new(RenderOptions::default());

    let mut updates = Vec::new();
    impose(
        &template,
        &rows,
        &layout,
        &mut renderer,
        &CancelHandle::new(),
        |u| updates.push(u),
    )
    .await
    .unwrap();

    assert!(matches!(updates[0], BatchUpdate::Started { rows: 7, pages: 2 }));
    assert!(matches!(updates.last(), Some(BatchUpdate::Finished { pages: 2, .. })));

    let rendered: Vec<usize> = updates
        .iter()
        .filter_map(|u| match u {
            BatchUpdate::RowRendered { row_index } => Some(*row_index),
            _ => None,
        })
        .collect();
    assert_eq!(rendered, (0..7).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_cancelled_batch_stops_between_rows() {
    let template = test_template();
    let rows = test_rows(12);
    let layout = test_layout();
    let mut renderer = RasterRenderer::new(RenderOptions::default());

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let result = impose(&template, &rows, &layout, &mut renderer, &cancel, |u| {
        if matches!(u, BatchUpdate::RowRendered { row_index: 2 }) {
            trigger.cancel();
        }
    })
    .await;

    assert!(matches!(result, Err(ImposeError::Cancelled)));
}

#[tokio::test]
async fn test_page_sequence_is_restartable() {
    let template = test_template();
    let rows = test_rows(4);
    let resolved = test_layout().resolve();
    let mut renderer = RasterRenderer::new(RenderOptions::default());

    let first = render_page(&template, &rows, &resolved, &mut renderer, 0)
        .await
        .unwrap();
    let again = render_page(&template, &rows, &resolved, &mut renderer, 0)
        .await
        .unwrap();

    assert_eq!(first.image.as_raw(), again.image.as_raw());
}

#[tokio::test]
async fn test_preview_renders_first_page_only() {
    let template = test_template();
    let rows = test_rows(7);
    let layout = test_layout();
    let mut renderer = RasterRenderer::new(RenderOptions::default());

    let preview = generate_preview(&template, &rows, &layout, &mut renderer)
        .await
        .unwrap()
        .expect("preview page");
    assert_eq!(preview.index, 0);

    let empty = generate_preview(&template, &[], &layout, &mut renderer)
        .await
        .unwrap();
    assert!(empty.is_none());
}

#[tokio::test]
async fn test_broken_image_row_does_not_abort_batch() {
    let mut template = test_template();
    template.objects.push(DocObject {
        id: "photo".to_string(),
        x: 60.0,
        y: 30.0,
        width: 30.0,
        height: 25.0,
        rotation: 0.0,
        field: None,
        frame_overlay: None,
        kind: ObjectKind::Image {
            src: "{{photo}}".to_string(),
            opacity: 1.0,
        },
    });

    let mut rows = test_rows(2);
    rows[0].insert(
        "photo".to_string(),
        "/nonexistent/missing-photo.png".to_string(),
    );
    // Row 1 has no photo value: token stays unresolved, no warning

    let layout = test_layout();
    let mut renderer = RasterRenderer::new(RenderOptions::default());

    let outcome = impose(
        &template,
        &rows,
        &layout,
        &mut renderer,
        &CancelHandle::new(),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(outcome.pages.len(), 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("missing-photo"));
}

#[tokio::test]
async fn test_marks_are_overlaid_on_pages() {
    let template = test_template();
    let rows = test_rows(1);
    let mut layout = test_layout();
    layout.marks.crop_marks = true;
    layout.bleed = Insets::uniform(2.0);

    let mut renderer = RasterRenderer::new(RenderOptions::default());
    let outcome = impose(
        &template,
        &rows,
        &layout,
        &mut renderer,
        &CancelHandle::new(),
        |_| {},
    )
    .await
    .unwrap();

    // Ink near the top-left trim corner, outside any cell
    let page = &outcome.pages[0].image;
    let resolved = layout.resolve();
    let corner_region_inked = (0..resolved.margin_top_px)
        .any(|y| (0..resolved.page_width_px).any(|x| page.get_pixel(x, y).0 != [255, 255, 255, 255]));
    assert!(corner_region_inked);
}
