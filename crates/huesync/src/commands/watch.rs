//! `watch`: follow the event stream and print notifications as they
//! arrive.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use owo_colors::OwoColorize;
use serde::Serialize;

use huesync_core::{Bridge, Notification, NotificationFilter, ResourceType};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct WatchLine {
    at: DateTime<Utc>,
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl WatchLine {
    fn new(notification: &Notification) -> Self {
        let mut line = Self {
            at: Utc::now(),
            event: event_name(notification),
            resource: notification.identity().map(ToString::to_string),
            origin: None,
            detail: None,
        };
        match notification {
            Notification::Changed { origin, target } if origin != target => {
                line.origin = Some(origin.to_string());
            }
            Notification::ConnectionError { message } => line.detail = Some(message.clone()),
            Notification::ReconnectScheduled { attempt, delay } => {
                line.detail = Some(format!("attempt {attempt} in {}ms", delay.as_millis()));
            }
            Notification::ReconnectGaveUp { attempts } => {
                line.detail = Some(format!("after {attempts} attempts"));
            }
            _ => {}
        }
        line
    }

    fn render(&self, format: &OutputFormat, color: bool) -> String {
        match format {
            OutputFormat::Json => output::render_json(self, false),
            OutputFormat::JsonCompact => output::render_json(self, true),
            OutputFormat::Yaml => format!("---\n{}", output::render_yaml(self).trim_end()),
            OutputFormat::Table | OutputFormat::Plain => {
                let time = self.at.format("%H:%M:%S%.3f").to_string();
                let mut text = if color {
                    format!("{} {:<20}", time.dimmed(), self.event.cyan())
                } else {
                    format!("{time} {:<20}", self.event)
                };
                if let Some(ref resource) = self.resource {
                    let _ = write!(text, " {resource}");
                }
                if let Some(ref origin) = self.origin {
                    let _ = write!(text, " (via {origin})");
                }
                if let Some(ref detail) = self.detail {
                    let _ = write!(text, " {detail}");
                }
                text
            }
        }
    }
}

fn event_name(notification: &Notification) -> &'static str {
    match notification {
        Notification::Connected => "connected",
        Notification::Disconnected => "disconnected",
        Notification::ConnectionError { .. } => "connection_error",
        Notification::ReconnectScheduled { .. } => "reconnect_scheduled",
        Notification::ReconnectGaveUp { .. } => "reconnect_gave_up",
        Notification::Created { .. } => "created",
        Notification::Changed { .. } => "changed",
        Notification::Deleted { .. } => "deleted",
        Notification::EventStart { .. } => "event_start",
        Notification::EventEnd { .. } => "event_end",
    }
}

fn is_marker(notification: &Notification) -> bool {
    matches!(
        notification,
        Notification::EventStart { .. } | Notification::EventEnd { .. }
    )
}

fn filter_for(args: &WatchArgs) -> NotificationFilter {
    if args.lifecycle {
        NotificationFilter::Lifecycle
    } else if args.connection {
        NotificationFilter::Connection
    } else if let Some(ref rtype) = args.rtype {
        NotificationFilter::Type(ResourceType::from(rtype.as_str()))
    } else {
        NotificationFilter::All
    }
}

pub async fn handle(bridge: &Bridge, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Subscribe before connecting so the initial connection events show up.
    // A resource filter needs the graph, so that one subscribes after.
    let mut stream = match args.resource {
        None => {
            let stream = bridge.notifications(filter_for(&args));
            util::connect(bridge, global).await?;
            stream
        }
        Some(ref needle) => {
            util::connect(bridge, global).await?;
            let handle = util::resolve(bridge, needle)?;
            bridge.notifications(NotificationFilter::Resource(handle.identity().clone()))
        }
    };

    let color = output::should_color(&global.color);
    let mut printed = 0usize;
    let outcome = loop {
        if args.count.is_some_and(|limit| printed >= limit) {
            break Ok(());
        }
        let next = tokio::select! {
            next = stream.next() => next,
            _ = tokio::signal::ctrl_c() => break Ok(()),
        };
        let Some(notification) = next else {
            break Ok(());
        };
        if is_marker(&notification) && !args.markers {
            continue;
        }

        let line = WatchLine::new(&notification);
        output::print_output(&line.render(&global.output, color), global.quiet);
        printed += 1;

        if let Notification::ReconnectGaveUp { attempts } = *notification {
            break Err(CliError::ConnectionFailed {
                message: format!("event stream gave up after {attempts} reconnect attempts"),
            });
        }
    };

    bridge.close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use huesync_core::ResourceIdentity;

    use super::*;

    #[test]
    fn changed_lines_name_their_origin() {
        let line = WatchLine::new(&Notification::Changed {
            target: ResourceIdentity::new("device", "D1"),
            origin: ResourceIdentity::new("light", "L1"),
        });
        let text = line.render(&OutputFormat::Plain, false);
        assert!(text.contains("changed"));
        assert!(text.ends_with("device/D1 (via light/L1)"), "{text}");
    }

    #[test]
    fn json_lines_skip_empty_fields() {
        let line = WatchLine::new(&Notification::Connected);
        let text = line.render(&OutputFormat::JsonCompact, false);
        assert!(text.contains(r#""event":"connected""#));
        assert!(!text.contains("resource"));
    }
}
