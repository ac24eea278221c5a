//! Terminal playground: two boxes laid out on a fake page, proximity
//! tracked from live mouse movement. Move the mouse near a box to see its
//! percentage climb; Esc or `q` quits.

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

use nearfield::{
    Document, DriverResult, ElementSpec, EmitValue, OutputFormat, ProximityResult, Rect, Session,
    SessionOptions, Size, TargetDescriptor, TerminalDriver,
};

fn is_near(result: &ProximityResult) -> bool {
    match result.data {
        EmitValue::Boolean(near) => near,
        EmitValue::Percentage(percent) => percent > 0.0,
    }
}

fn draw_box(stdout: &mut impl Write, rect: Rect, near: bool) -> io::Result<()> {
    let color = if near { Color::Green } else { Color::DarkRed };
    execute!(stdout, SetForegroundColor(color))?;
    let width = rect.width() as usize;
    let horizontal = format!("+{}+", "-".repeat(width.saturating_sub(2)));
    execute!(
        stdout,
        MoveTo(rect.left as u16, rect.top as u16),
        Print(&horizontal)
    )?;
    for row in (rect.top as u16 + 1)..(rect.bottom as u16) {
        execute!(stdout, MoveTo(rect.left as u16, row), Print("|"))?;
        execute!(stdout, MoveTo(rect.right as u16 - 1, row), Print("|"))?;
    }
    execute!(
        stdout,
        MoveTo(rect.left as u16, rect.bottom as u16),
        Print(&horizontal),
        ResetColor
    )?;
    Ok(())
}

fn main() -> DriverResult<()> {
    let document = Document::new(Size::new(120.0, 40.0));
    let area_one = document.insert(
        ElementSpec::new("div")
            .with_id("area-1")
            .with_rect(Rect::new(10.0, 5.0, 40.0, 14.0)),
    );
    let area_two = document.insert(
        ElementSpec::new("div")
            .with_id("area-2")
            .with_rect(Rect::new(60.0, 18.0, 95.0, 29.0)),
    );

    let status_doc = document.clone();
    let options = SessionOptions {
        format: OutputFormat::Percentage,
        on_proximity: Some(Arc::new(move |results| {
            let mut stdout = io::stdout();
            for result in results {
                if let Some(element) = result.element {
                    if let Some(rect) = status_doc.rect(element) {
                        let _ = draw_box(&mut stdout, rect, is_near(result));
                    }
                }
            }
            let line = results
                .iter()
                .map(|result| match result.data {
                    EmitValue::Percentage(percent) => format!("{} {percent:>6.2}%", result.uid),
                    EmitValue::Boolean(near) => format!("{} {near}", result.uid),
                })
                .collect::<Vec<_>>()
                .join("   ");
            let _ = execute!(
                stdout,
                MoveTo(0, 0),
                Print(format!("{line:<110}")),
                MoveTo(0, 1),
                Print("move the mouse near a box; Esc or q to quit")
            );
            let _ = stdout.flush();
        })),
        ..SessionOptions::default()
    };

    let session = Session::create(
        &document,
        vec![
            TargetDescriptor::new(area_one).with_distance(6.0),
            TargetDescriptor::new(area_two).with_distance((12.0, 4.0)),
        ],
        options,
    );

    TerminalDriver::new(document).watch(session).run()
}
