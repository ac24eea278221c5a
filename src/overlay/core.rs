use crate::document::{Document, ElementId, ElementSpec};
use crate::geometry::Rect;
use crate::target::{DEBUG_ID_ATTR, PROXIMITY_ATTR, ResolvedTarget};

const IDLE_BORDER: &str = "rgba(239,66,66,.8)";
const ACTIVE_BORDER: &str = "rgba(66,239,66,.8)";

/// One debug overlay element, remembered so resize/scroll ticks can find it
/// without a document scan.
#[derive(Debug, Clone)]
pub struct OverlayNode {
    pub element: ElementId,
    pub target_uid: String,
    pub context_uid: Option<String>,
}

/// Expanded target bounds in page coordinates, shifted by the context's
/// scroll offsets like the evaluator does.
fn overlay_rect(document: &Document, target: &ResolvedTarget) -> Option<Rect> {
    let rect = document.rect(target.element)?;
    let rect = match target
        .context
        .as_ref()
        .and_then(|c| document.scroll_offsets(c.element))
    {
        Some(scroll) => rect.translate(-scroll.x, -scroll.y),
        None => rect,
    };
    Some(rect.expand(target.distance.x, target.distance.y))
}

fn style_string(rect: Rect, active: bool) -> String {
    let color = if active { ACTIVE_BORDER } else { IDLE_BORDER };
    format!(
        "position:absolute;top:{}px;left:{}px;width:{}px;height:{}px;\
         border:1px dashed {};pointer-events:none;box-sizing:border-box",
        rect.top,
        rect.left,
        rect.width(),
        rect.height(),
        color
    )
}

fn latest_proximity(document: &Document, target: &ResolvedTarget) -> bool {
    document
        .attribute(target.element, PROXIMITY_ATTR)
        .as_deref()
        == Some("true")
}

/// Insert one overlay node per enabled resolved target.
pub(crate) fn build_overlays(document: &Document, targets: &[ResolvedTarget]) -> Vec<OverlayNode> {
    let mut overlays = Vec::new();
    for target in targets.iter().filter(|t| t.enabled) {
        let Some(rect) = overlay_rect(document, target) else {
            continue;
        };
        let element = document.insert(ElementSpec::new("div").with_rect(rect));
        document.set_attribute(element, DEBUG_ID_ATTR, target.uid.clone());
        document.set_attribute(element, "style", style_string(rect, latest_proximity(document, target)));
        overlays.push(OverlayNode {
            element,
            target_uid: target.uid.clone(),
            context_uid: target.context.as_ref().map(|c| c.uid.clone()),
        });
    }
    overlays
}

pub(crate) fn remove_overlays(document: &Document, overlays: &[OverlayNode]) {
    for overlay in overlays {
        document.remove(overlay.element);
    }
}

/// Toggle the highlight color of the overlay mirroring `target_uid`.
pub(crate) fn set_overlay_active(
    document: &Document,
    overlays: &[OverlayNode],
    target_uid: &str,
    active: bool,
) {
    for overlay in overlays.iter().filter(|o| o.target_uid == target_uid) {
        if let Some(rect) = document.rect(overlay.element) {
            document.set_attribute(overlay.element, "style", style_string(rect, active));
        }
    }
}

/// Reposition only the overlays scoped to `context_uid`, after that context
/// scrolled. Avoids a global rebuild on every scoped scroll.
pub(crate) fn reposition_overlays(
    document: &Document,
    overlays: &[OverlayNode],
    targets: &[ResolvedTarget],
    context_uid: &str,
) {
    for overlay in overlays
        .iter()
        .filter(|o| o.context_uid.as_deref() == Some(context_uid))
    {
        let Some(target) = targets.iter().find(|t| t.uid == overlay.target_uid) else {
            continue;
        };
        let Some(rect) = overlay_rect(document, target) else {
            continue;
        };
        document.set_rect(overlay.element, rect);
        document.set_attribute(
            overlay.element,
            "style",
            style_string(rect, latest_proximity(document, target)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ElementSpec;
    use crate::geometry::{Point, Size};
    use crate::target::{Distance, OutputFormat, ResolvedContext};

    fn doc() -> Document {
        Document::new(Size::new(1024.0, 768.0))
    }

    fn resolved(
        uid: &str,
        element: ElementId,
        distance: Distance,
        context: Option<ResolvedContext>,
    ) -> ResolvedTarget {
        ResolvedTarget {
            uid: uid.to_string(),
            element,
            distance,
            format: OutputFormat::Boolean,
            enabled: true,
            context,
            on_proximity: None,
            source: 0,
        }
    }

    #[test]
    fn build_mirrors_expanded_bounds_and_tags_nodes() {
        let doc = doc();
        let el = doc.insert(ElementSpec::new("div").with_rect(Rect::new(100.0, 100.0, 200.0, 200.0)));
        let targets = vec![resolved("nf_1", el, Distance { x: 10.0, y: 5.0 }, None)];

        let overlays = build_overlays(&doc, &targets);
        assert_eq!(overlays.len(), 1);
        assert_eq!(
            doc.rect(overlays[0].element),
            Some(Rect::new(90.0, 95.0, 210.0, 205.0))
        );
        assert_eq!(
            doc.attribute(overlays[0].element, DEBUG_ID_ATTR).as_deref(),
            Some("nf_1")
        );
        let style = doc.attribute(overlays[0].element, "style").unwrap();
        assert!(style.contains("dashed"));
        assert!(style.contains(IDLE_BORDER));
    }

    #[test]
    fn disabled_targets_get_no_overlay() {
        let doc = doc();
        let el = doc.insert(ElementSpec::new("div"));
        let mut target = resolved("nf_1", el, Distance::default(), None);
        target.enabled = false;
        assert!(build_overlays(&doc, &[target]).is_empty());
    }

    #[test]
    fn active_toggle_swaps_border_color() {
        let doc = doc();
        let el = doc.insert(ElementSpec::new("div").with_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let targets = vec![resolved("nf_1", el, Distance::default(), None)];
        let overlays = build_overlays(&doc, &targets);

        set_overlay_active(&doc, &overlays, "nf_1", true);
        let style = doc.attribute(overlays[0].element, "style").unwrap();
        assert!(style.contains(ACTIVE_BORDER));

        set_overlay_active(&doc, &overlays, "nf_1", false);
        let style = doc.attribute(overlays[0].element, "style").unwrap();
        assert!(style.contains(IDLE_BORDER));
    }

    #[test]
    fn reposition_touches_only_matching_context() {
        let doc = doc();
        let ctx = doc.insert(ElementSpec::new("div").with_rect(Rect::new(0.0, 0.0, 400.0, 400.0)));
        let scoped = doc.insert(ElementSpec::new("div").with_rect(Rect::new(50.0, 50.0, 150.0, 150.0)));
        let free = doc.insert(ElementSpec::new("div").with_rect(Rect::new(500.0, 50.0, 600.0, 150.0)));

        let targets = vec![
            resolved(
                "nf_1",
                scoped,
                Distance::default(),
                Some(ResolvedContext {
                    element: ctx,
                    uid: "nf_context_2".to_string(),
                }),
            ),
            resolved("nf_3", free, Distance::default(), None),
        ];
        let overlays = build_overlays(&doc, &targets);
        let free_rect_before = doc.rect(overlays[1].element);

        doc.set_attribute(ctx, crate::target::CONTEXT_UID_ATTR, "nf_context_2");
        doc.scroll_element(ctx, Point::new(0.0, 25.0));
        reposition_overlays(&doc, &overlays, &targets, "nf_context_2");

        assert_eq!(
            doc.rect(overlays[0].element),
            Some(Rect::new(50.0, 25.0, 150.0, 125.0))
        );
        assert_eq!(doc.rect(overlays[1].element), free_rect_before);
    }

    #[test]
    fn remove_deletes_overlay_nodes() {
        let doc = doc();
        let el = doc.insert(ElementSpec::new("div"));
        let targets = vec![resolved("nf_1", el, Distance::default(), None)];
        let overlays = build_overlays(&doc, &targets);
        remove_overlays(&doc, &overlays);
        assert!(!doc.contains(overlays[0].element));
        assert!(doc.contains(el));
    }
}
