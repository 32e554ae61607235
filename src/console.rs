// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Interactive command console.
//!
//! Each line is one user interaction: a click on a list row, a marker, a
//! button. Output is the resulting view state.

use log::warn;
use place_core::assistant::{CompletionBackend, SummarySource};
use place_core::links::{Clipboard, ClipboardError};
use place_core::selection::{SelectRequest, Views};
use place_core::{GeoFix, Session};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const HELP: &str = "\
Commands:
  list                    show visible POIs and zones
  search <text>           filter the list by title (empty clears)
  select <id>             select a place
  pick <json>             select an ad-hoc place, e.g. {\"title\":\"Gate\",\"coords\":[10,20]}
  go <id>                 select a place and fit the maps to it
  nearby <n>              follow the n-th recommendation
  show                    print the details panel and map state
  share                   copy a deep link to the selection
  link                    copy the map's own address
  map <id>                copy an external map link for a place
  directions [open]       external map link for the selection
  dismiss                 clear the selection
  ask <question>          ask the assistant about the selection
  open <fragment>         follow a deep link such as #poi=library
  locate <lat> <lng>      report a position fix
  fit                     fit both maps to the whole image
  zoom <delta>            zoom both maps in or out
  quit                    exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    List,
    Search(String),
    Select(String),
    Pick(SelectRequest),
    Go(String),
    Nearby(usize),
    Show,
    Share,
    CopyMapLink,
    MapLink(String),
    Directions { open: bool },
    Dismiss,
    Ask(String),
    Open(String),
    Locate { lat: f64, lng: f64 },
    Fit,
    Zoom(f64),
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("missing {0}")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("invalid place: {0}")]
    InvalidPlace(String),
}

fn required<'a>(rest: &'a str, what: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(what))
    } else {
        Ok(rest)
    }
}

fn number<T: std::str::FromStr>(text: &str) -> Result<T, CommandError> {
    text.parse()
        .ok()
        .ok_or_else(|| CommandError::InvalidNumber(text.to_string()))
}

/// Parse one console line. `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let command = match word.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "list" | "ls" => Command::List,
        "search" | "filter" => Command::Search(rest.to_string()),
        "select" => Command::Select(required(rest, "place id")?.to_string()),
        "pick" => {
            let request = serde_json::from_str(required(rest, "place JSON")?)
                .map_err(|e| CommandError::InvalidPlace(e.to_string()))?;
            Command::Pick(request)
        }
        "go" => Command::Go(required(rest, "place id")?.to_string()),
        "nearby" => Command::Nearby(number(required(rest, "recommendation number")?)?),
        "show" => Command::Show,
        "share" => Command::Share,
        "link" => Command::CopyMapLink,
        "map" => Command::MapLink(required(rest, "place id")?.to_string()),
        "directions" => Command::Directions {
            open: rest.eq_ignore_ascii_case("open"),
        },
        "dismiss" | "close" => Command::Dismiss,
        "ask" => Command::Ask(rest.to_string()),
        "open" => Command::Open(required(rest, "link fragment")?.to_string()),
        "locate" => {
            let mut parts = rest.split_whitespace();
            let lat = number(parts.next().ok_or(CommandError::MissingArgument("latitude"))?)?;
            let lng = number(parts.next().ok_or(CommandError::MissingArgument("longitude"))?)?;
            Command::Locate { lat, lng }
        }
        "fit" => Command::Fit,
        "zoom" => Command::Zoom(number(required(rest, "zoom delta")?)?),
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Clipboard for a terminal: prints what was copied and keeps it.
#[derive(Debug, Default)]
pub struct StdoutClipboard {
    last: Option<String>,
}

impl Clipboard for StdoutClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        println!("Copied to clipboard: {text}");
        self.last = Some(text.to_string());
        Ok(())
    }
}

fn print_views(views: &Views) {
    let panel = &views.panel;
    if panel.visible {
        println!("== {} ==", panel.title);
        println!("image: {}", panel.image);
        if !panel.description.is_empty() {
            println!("{}", panel.description);
        }
    }
    println!("footer: {}", views.footer);
    if panel.visible {
        println!("share button: {}", views.share_label);
    }

    if views.recommendations.visible {
        println!("Nearby:");
        for (i, rec) in views.recommendations.items.iter().enumerate() {
            println!(
                "  {}. {} [{}] {:.0}px",
                i + 1,
                rec.place.title,
                rec.place.kind.label(),
                rec.distance
            );
        }
    }

    for viewport in [&views.desktop, &views.mobile] {
        let center = viewport.center();
        print!(
            "{:?} map: center ({:.0}, {:.0}) zoom {}",
            viewport.id(),
            center.y,
            center.x,
            viewport.zoom()
        );
        match viewport.user_location() {
            Some(you) => println!(", you are at ({:.0}, {:.0})", you.y, you.x),
            None => println!(),
        }
    }

    if !views.assistant.question.is_empty() {
        println!("Q: {}", views.assistant.question);
    }
    if !views.assistant.answer.is_empty() {
        println!("A: {}", views.assistant.answer);
    }
}

/// Run one command. Returns `false` when the console should exit.
pub async fn execute<B, S>(
    session: &Session<B, S>,
    clipboard: &mut StdoutClipboard,
    command: Command,
) -> Result<bool, Box<dyn std::error::Error>>
where
    B: CompletionBackend + Send + Sync + 'static,
    S: SummarySource + Send + Sync + 'static,
{
    match command {
        Command::Help => println!("{HELP}"),
        Command::List => {
            let sidebar = session.sidebar();
            for row in sidebar.visible_rows() {
                println!("{:<5} {:<20} {}", row.label(), row.id, row.title);
            }
            if !sidebar.query().is_empty() {
                println!("(filtered by '{}')", sidebar.query());
            }
        }
        Command::Search(query) => {
            session.filter(&query);
            println!("{} matching", session.sidebar().visible_rows().count());
        }
        Command::Select(id) => {
            session.select_by_id(&id)?;
            print_views(session.controller().views());
        }
        Command::Pick(request) => {
            session.controller().select(request)?;
            print_views(session.controller().views());
        }
        Command::Go(id) => {
            session.go(&id)?;
            print_views(session.controller().views());
        }
        Command::Nearby(n) => {
            session
                .controller()
                .select_recommendation(n.saturating_sub(1))?;
            print_views(session.controller().views());
        }
        Command::Show => print_views(session.controller().views()),
        Command::Share => {
            if session.share_link(clipboard).is_none() {
                println!("Nothing selected");
            }
        }
        Command::CopyMapLink => {
            session.copy_map_link(clipboard);
        }
        Command::MapLink(id) => {
            if session.share_place(&id, clipboard).is_none() {
                println!("No map link for '{id}'");
            }
        }
        Command::Directions { open } => {
            let link = session.controller().directions_link();
            match link {
                Some(url) => {
                    println!("{url}");
                    if open {
                        if let Err(e) = webbrowser::open(&url) {
                            warn!("Could not open browser: {e}");
                        }
                    }
                }
                None => println!("Directions unavailable"),
            }
        }
        Command::Dismiss => {
            if session.dismiss() {
                print_views(session.controller().views());
            }
        }
        Command::Ask(question) => {
            if let Some(pending) = session.ask(&question) {
                pending.await?;
                print_views(session.controller().views());
            }
        }
        Command::Open(fragment) => {
            if session.open_fragment(&fragment) {
                print_views(session.controller().views());
            } else {
                println!("No place for '{fragment}'");
            }
        }
        Command::Locate { lat, lng } => {
            if session.report_fix(GeoFix::new(lat, lng)) {
                if let Some(pixel) = session.tracker().latest_pixel() {
                    println!("You are at ({:.0}, {:.0})", pixel.y, pixel.x);
                }
            }
        }
        Command::Fit => {
            session.fit_all();
            print_views(session.controller().views());
        }
        Command::Zoom(delta) => {
            let mut controller = session.controller();
            for viewport in controller.views_mut().viewports_mut() {
                viewport.zoom_by(delta);
            }
            print_views(controller.views());
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run<B, S>(session: &Session<B, S>) -> Result<(), Box<dyn std::error::Error>>
where
    B: CompletionBackend + Send + Sync + 'static,
    S: SummarySource + Send + Sync + 'static,
{
    let mut clipboard = StdoutClipboard::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type 'help' for commands.");
    while let Some(line) = lines.next_line().await? {
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match execute(session, &mut clipboard, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use place_core::GeoPoint;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("   "), Ok(None));
        assert_eq!(parse("LIST"), Ok(Some(Command::List)));
        assert_eq!(parse("search  main lib "), Ok(Some(Command::Search("main lib".to_string()))));
        assert_eq!(parse("search"), Ok(Some(Command::Search(String::new()))));
        assert_eq!(parse("go zone-7"), Ok(Some(Command::Go("zone-7".to_string()))));
        assert_eq!(parse("nearby 2"), Ok(Some(Command::Nearby(2))));
        assert_eq!(parse("link"), Ok(Some(Command::CopyMapLink)));
        assert_eq!(
            parse("directions open"),
            Ok(Some(Command::Directions { open: true }))
        );
        assert_eq!(
            parse("ask is it open late?"),
            Ok(Some(Command::Ask("is it open late?".to_string())))
        );
        assert_eq!(
            parse("locate 2.981 101.51"),
            Ok(Some(Command::Locate {
                lat: 2.981,
                lng: 101.51
            }))
        );
        assert_eq!(parse("zoom -1"), Ok(Some(Command::Zoom(-1.0))));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("fly home"), Err(CommandError::Unknown("fly".to_string())));
        assert_eq!(parse("select"), Err(CommandError::MissingArgument("place id")));
        assert_eq!(parse("nearby two"), Err(CommandError::InvalidNumber("two".to_string())));
        assert_eq!(parse("locate 2.9"), Err(CommandError::MissingArgument("longitude")));
        assert!(matches!(parse("pick {oops"), Err(CommandError::InvalidPlace(_))));
    }

    #[test]
    fn test_pick_accepts_both_coordinate_shapes() {
        let Ok(Some(Command::Pick(pair))) = parse(r#"pick {"title":"Gate","coords":[10,20]}"#) else {
            panic!("pair not parsed");
        };
        let Ok(Some(Command::Pick(object))) =
            parse(r#"pick {"title":"Gate","desc":"Main gate","coords":{"lat":10,"lng":20}}"#)
        else {
            panic!("object not parsed");
        };

        let pair = pair.coords.unwrap().normalize();
        assert_eq!(pair, GeoPoint::new(10.0, 20.0));
        assert_eq!(object.coords.unwrap().normalize(), pair);
        assert_eq!(object.description.as_deref(), Some("Main gate"));
    }

    #[test]
    fn test_stdout_clipboard_keeps_last() {
        let mut clipboard = StdoutClipboard::default();
        clipboard.write_text("http://localhost:8080/#poi=a").unwrap();
        assert_eq!(clipboard.last.as_deref(), Some("http://localhost:8080/#poi=a"));
    }
}
