use serde::Serialize;

use crate::document::{Document, ElementId};
use crate::geometry::{Point, Rect};
use crate::target::{Distance, OutputFormat, PROXIMITY_ATTR};

/// Emitted proximity value: the boolean containment itself, or a 0–100
/// closeness percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EmitValue {
    Boolean(bool),
    Percentage(f64),
}

impl EmitValue {
    /// Inert value for a format, emitted when evaluation cannot run.
    pub fn default_for(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Boolean => EmitValue::Boolean(false),
            OutputFormat::Percentage => EmitValue::Percentage(0.0),
        }
    }
}

/// Outcome of one target evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub proximity: bool,
    pub emit: EmitValue,
}

impl Evaluation {
    fn missed(format: OutputFormat) -> Self {
        Self {
            proximity: false,
            emit: EmitValue::default_for(format),
        }
    }
}

/// Evaluate one target against the cursor.
///
/// The cursor and every rectangle are compared in page coordinates. When a
/// context is present the target's rectangle shifts with the context's
/// scroll offsets, and a cursor outside the context's own rectangle
/// short-circuits to a miss: proximity never fires for elements scrolled
/// out of view of their container.
///
/// As a side effect the target element's proximity marker attribute is
/// updated to the boolean containment state on every evaluation.
pub fn evaluate(
    document: &Document,
    format: OutputFormat,
    target: ElementId,
    context: Option<ElementId>,
    distance: Distance,
    cursor: Point,
) -> Evaluation {
    let Some(rect) = document.rect(target) else {
        return Evaluation::missed(format);
    };

    if let Some(context) = context {
        if let Some(context_rect) = document.rect(context) {
            if !context_rect.contains(cursor) {
                publish(document, target, false);
                return Evaluation::missed(format);
            }
        }
    }

    let rect = match context.and_then(|c| document.scroll_offsets(c)) {
        Some(scroll) => rect.translate(-scroll.x, -scroll.y),
        None => rect,
    };
    let expanded = rect.expand(distance.x, distance.y);
    let proximity = expanded.contains(cursor);
    publish(document, target, proximity);

    let emit = match format {
        OutputFormat::Boolean => EmitValue::Boolean(proximity),
        OutputFormat::Percentage => {
            EmitValue::Percentage(percentage_score(rect, expanded, distance, cursor, proximity))
        }
    };
    Evaluation { proximity, emit }
}

fn publish(document: &Document, target: ElementId, proximity: bool) {
    document.set_attribute(target, PROXIMITY_ATTR, if proximity { "true" } else { "false" });
}

/// Graduated closeness inside the margin bands of the expanded rectangle.
///
/// The four bands are the directional zones: within a band the score is the
/// cursor's penetration over the margin span, inside the base rectangle the
/// score saturates at 100, and outside the expanded rectangle every zone
/// scores zero. Corner overlaps resolve by taking the larger axis score.
fn percentage_score(
    base: Rect,
    expanded: Rect,
    distance: Distance,
    cursor: Point,
    proximity: bool,
) -> f64 {
    if !proximity {
        return 0.0;
    }
    if base.contains(cursor) {
        return 100.0;
    }

    let left = if distance.x > 0.0 && cursor.x < base.left {
        ratio(cursor.x - expanded.left, distance.x)
    } else {
        0.0
    };
    let right = if distance.x > 0.0 && cursor.x > base.right {
        ratio(expanded.right - cursor.x, distance.x)
    } else {
        0.0
    };
    let top = if distance.y > 0.0 && cursor.y < base.top {
        ratio(cursor.y - expanded.top, distance.y)
    } else {
        0.0
    };
    let bottom = if distance.y > 0.0 && cursor.y > base.bottom {
        ratio(expanded.bottom - cursor.y, distance.y)
    } else {
        0.0
    };

    left.max(right).max(top).max(bottom)
}

fn ratio(partial: f64, span: f64) -> f64 {
    let percent = (100.0 * partial / span).clamp(0.0, 100.0);
    (percent * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ElementSpec;
    use crate::geometry::Size;

    fn doc_with_target() -> (Document, ElementId) {
        let doc = Document::new(Size::new(1024.0, 768.0));
        let el = doc.insert(ElementSpec::new("div").with_rect(Rect::new(100.0, 100.0, 200.0, 200.0)));
        (doc, el)
    }

    fn eval_bool(doc: &Document, el: ElementId, distance: Distance, x: f64, y: f64) -> Evaluation {
        evaluate(
            doc,
            OutputFormat::Boolean,
            el,
            None,
            distance,
            Point::new(x, y),
        )
    }

    // Scenario A: zero margin, boolean format.
    #[test]
    fn containment_with_zero_margin() {
        let (doc, el) = doc_with_target();
        let inside = eval_bool(&doc, el, Distance::default(), 150.0, 150.0);
        assert_eq!(inside.emit, EmitValue::Boolean(true));
        assert_eq!(doc.attribute(el, PROXIMITY_ATTR).as_deref(), Some("true"));

        let outside = eval_bool(&doc, el, Distance::default(), 99.0, 150.0);
        assert_eq!(outside.emit, EmitValue::Boolean(false));
        assert_eq!(doc.attribute(el, PROXIMITY_ATTR).as_deref(), Some("false"));
    }

    // Scenario B: asymmetric margin expands only the x axis.
    #[test]
    fn containment_with_horizontal_margin() {
        let (doc, el) = doc_with_target();
        let margin = Distance { x: 10.0, y: 0.0 };
        assert!(eval_bool(&doc, el, margin, 92.0, 150.0).proximity);
        assert!(!eval_bool(&doc, el, margin, 89.0, 150.0).proximity);
    }

    #[test]
    fn expanded_edge_is_inclusive() {
        let (doc, el) = doc_with_target();
        let margin = Distance { x: 10.0, y: 10.0 };
        assert!(eval_bool(&doc, el, margin, 90.0, 150.0).proximity);
        assert!(eval_bool(&doc, el, margin, 210.0, 210.0).proximity);
    }

    // Scenario C: cursor outside the context viewport suppresses proximity
    // even when the expanded target rectangle would contain it.
    #[test]
    fn context_viewport_short_circuits() {
        let doc = Document::new(Size::new(1024.0, 768.0));
        let ctx = doc.insert(ElementSpec::new("div").with_rect(Rect::new(0.0, 0.0, 300.0, 300.0)));
        let el = doc.insert(ElementSpec::new("div").with_rect(Rect::new(100.0, 100.0, 200.0, 200.0)));

        let eval = evaluate(
            &doc,
            OutputFormat::Boolean,
            el,
            Some(ctx),
            Distance {
                x: 1000.0,
                y: 1000.0,
            },
            Point::new(500.0, 500.0),
        );
        assert!(!eval.proximity);
        assert_eq!(eval.emit, EmitValue::Boolean(false));
        assert_eq!(doc.attribute(el, PROXIMITY_ATTR).as_deref(), Some("false"));
    }

    #[test]
    fn context_scroll_shifts_the_target() {
        let doc = Document::new(Size::new(1024.0, 768.0));
        let ctx = doc.insert(ElementSpec::new("div").with_rect(Rect::new(0.0, 0.0, 300.0, 300.0)));
        let el = doc.insert(ElementSpec::new("div").with_rect(Rect::new(100.0, 100.0, 200.0, 200.0)));
        doc.scroll_element(ctx, Point::new(0.0, 80.0));

        // The target's effective rectangle is now 20..120 vertically.
        let hit = evaluate(
            &doc,
            OutputFormat::Boolean,
            el,
            Some(ctx),
            Distance::default(),
            Point::new(150.0, 30.0),
        );
        assert!(hit.proximity);
        let miss = evaluate(
            &doc,
            OutputFormat::Boolean,
            el,
            Some(ctx),
            Distance::default(),
            Point::new(150.0, 150.0),
        );
        assert!(!miss.proximity);
    }

    #[test]
    fn percentage_saturates_inside_the_base_rect() {
        let (doc, el) = doc_with_target();
        let eval = evaluate(
            &doc,
            OutputFormat::Percentage,
            el,
            None,
            Distance { x: 10.0, y: 10.0 },
            Point::new(150.0, 150.0),
        );
        assert_eq!(eval.emit, EmitValue::Percentage(100.0));
    }

    #[test]
    fn percentage_grades_the_margin_band() {
        let (doc, el) = doc_with_target();
        let margin = Distance { x: 10.0, y: 0.0 };
        // Two pixels past the expanded left edge of a ten pixel margin.
        let eval = evaluate(
            &doc,
            OutputFormat::Percentage,
            el,
            None,
            margin,
            Point::new(92.0, 150.0),
        );
        assert_eq!(eval.emit, EmitValue::Percentage(20.0));
        // Outside the expanded rectangle the score is zero.
        let eval = evaluate(
            &doc,
            OutputFormat::Percentage,
            el,
            None,
            margin,
            Point::new(89.0, 150.0),
        );
        assert_eq!(eval.emit, EmitValue::Percentage(0.0));
    }

    #[test]
    fn percentage_corner_takes_the_larger_axis() {
        let (doc, el) = doc_with_target();
        let margin = Distance { x: 10.0, y: 10.0 };
        // Corner region: 8 pixels into the left band, 4 into the top band.
        let eval = evaluate(
            &doc,
            OutputFormat::Percentage,
            el,
            None,
            margin,
            Point::new(98.0, 94.0),
        );
        assert_eq!(eval.emit, EmitValue::Percentage(80.0));
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let (doc, el) = doc_with_target();
        let margin = Distance { x: 3.0, y: 0.0 };
        // One pixel into a three pixel margin: 33.333… rounds to 33.33.
        let eval = evaluate(
            &doc,
            OutputFormat::Percentage,
            el,
            None,
            margin,
            Point::new(98.0, 150.0),
        );
        assert_eq!(eval.emit, EmitValue::Percentage(33.33));
    }

    #[test]
    fn removed_element_misses_without_attribute_writes() {
        let (doc, el) = doc_with_target();
        doc.remove(el);
        let eval = eval_bool(&doc, el, Distance::default(), 150.0, 150.0);
        assert!(!eval.proximity);
        assert_eq!(eval.emit, EmitValue::Boolean(false));
    }
}
