//! Chat screen: the message log grouped by day, and the input line.

use chrono::{DateTime, Local, TimeZone};
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};
use sames_core::{
  profile::UserId,
  thread::{DateGroup, DeliveryState},
};

use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Min(0), Constraint::Length(3)])
    .split(area);

  let block = Block::default()
    .title(format!(" {} ", app.chat_name))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(rows[0]);
  f.render_widget(block, rows[0]);

  let groups = app
    .thread
    .as_ref()
    .map(|t| t.group_by_date())
    .unwrap_or_default();

  if groups.is_empty() {
    f.render_widget(
      Paragraph::new("Say hello!")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray)),
      inner,
    );
  } else {
    let lines = log_lines(&groups, app.me.id, &app.chat_name, &Local);
    let log = Paragraph::new(lines).wrap(Wrap { trim: false });
    // Keep the newest messages in view, counting wrapped rows.
    let rows = log.line_count(inner.width);
    let scroll = rows.saturating_sub(usize::from(inner.height));
    let scroll = u16::try_from(scroll).unwrap_or(u16::MAX);
    f.render_widget(log.scroll((scroll, 0)), inner);
  }

  let input = Paragraph::new(Line::from(vec![
    Span::styled("> ", Style::default().fg(Color::Magenta)),
    Span::raw(app.input.clone()),
    Span::styled("█", Style::default().fg(Color::Magenta)),
  ]))
  .block(
    Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta)),
  );
  f.render_widget(input, rows[1]);
}

fn log_lines<Tz: TimeZone>(
  groups: &[DateGroup],
  me: UserId,
  counterpart: &str,
  tz: &Tz,
) -> Vec<Line<'static>>
where
  Tz::Offset: std::fmt::Display,
{
  let mut lines = Vec::new();
  for group in groups {
    lines.push(
      Line::from(Span::styled(
        format!("── {} ──", group.label),
        Style::default().fg(Color::DarkGray),
      ))
      .alignment(Alignment::Center),
    );

    for (message, show_sender) in group.entries() {
      let mine = message.sender_id == me;
      if show_sender {
        let who = if mine { "You" } else { counterpart };
        lines.push(Line::from(Span::styled(
          who.to_string(),
          Style::default().add_modifier(Modifier::BOLD),
        )));
      }

      let time = local_time(&message.sent_at, tz);
      let mut spans = vec![
        Span::styled(format!("{time} "), Style::default().fg(Color::DarkGray)),
        Span::raw(message.text.clone()),
      ];
      if message.delivery == DeliveryState::Failed {
        spans.push(Span::styled(" (not delivered)", Style::default().fg(Color::Red)));
      }
      let line = Line::from(spans);
      lines.push(if mine { line.alignment(Alignment::Right) } else { line });
    }
  }
  lines
}

fn local_time<Tz: TimeZone>(at: &DateTime<chrono::Utc>, tz: &Tz) -> String
where
  Tz::Offset: std::fmt::Display,
{
  at.with_timezone(tz).format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use sames_core::thread::ConversationThread;

  use super::*;

  fn text(lines: &[Line]) -> Vec<String> {
    lines
      .iter()
      .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
      .collect()
  }

  #[test]
  fn sender_shown_once_per_run() {
    let thread = ConversationThread::new(UserId(2));
    let at = |h| Utc.with_ymd_and_hms(2026, 3, 4, h, 0, 0).unwrap();
    thread.insert(UserId(1), "hi", at(9)).unwrap();
    thread.insert(UserId(1), "you there?", at(10)).unwrap();
    thread.insert(UserId(2), "yes!", at(11)).unwrap();

    let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
    let groups = thread.group_by_date_at(&now);
    let lines = text(&log_lines(&groups, UserId(1), "Alex", &Utc));

    assert_eq!(lines, vec![
      "── Today ──",
      "You",
      "9:00 AM hi",
      "10:00 AM you there?",
      "Alex",
      "11:00 AM yes!",
    ]);
  }

  #[test]
  fn newest_message_visible_after_wrapping() {
    let mut app = crate::app::tests::app();
    app.chat_name = "Alex".into();
    let thread = ConversationThread::new(UserId(2));
    let base = Utc::now() - chrono::Duration::minutes(10);
    for i in 0..3 {
      thread
        .insert(
          UserId(2),
          "a rather long message that will certainly wrap over several rows",
          base + chrono::Duration::minutes(i),
        )
        .unwrap();
    }
    thread
      .insert(UserId(1), "latest!", base + chrono::Duration::minutes(5))
      .unwrap();
    app.thread = Some(thread);

    let mut terminal =
      ratatui::Terminal::new(ratatui::backend::TestBackend::new(30, 12)).unwrap();
    terminal
      .draw(|f| {
        let area = f.area();
        draw(f, area, &app);
      })
      .unwrap();
    let screen: String = terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect();
    assert!(screen.contains("latest!"));
  }

  #[test]
  fn failed_messages_are_flagged() {
    let thread = ConversationThread::new(UserId(2));
    let sent = thread
      .insert(UserId(1), "hello", Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap())
      .unwrap();
    thread.mark_failed(sent.id);

    let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
    let lines = text(&log_lines(&thread.group_by_date_at(&now), UserId(1), "Alex", &Utc));
    assert_eq!(lines[0], "── 3/1/2026 ──");
    assert_eq!(lines[2], "8:30 AM hello (not delivered)");
  }
}
