//! Discover screen: the current candidate card.

use ratatui::{
  Frame,
  layout::{Alignment, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};
use sames_core::{
  deck::DeckState,
  profile::{CandidateCard, Category},
};
use strum::IntoEnumIterator;

use crate::app::App;

/// Render the deck into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let deck = &app.deck;
  let title = match deck.state() {
    DeckState::Exhausted => " Discover ".to_string(),
    _ => format!(" Discover ({} of {}) ", deck.position() + 1, deck.len()),
  };

  let border = if app.accepting_input() { Color::Magenta } else { Color::DarkGray };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let Some(card) = deck.current() else {
    let text = if deck.is_empty() {
      "No candidates yet. Press r to load."
    } else {
      "You've seen everyone for now. Press r to check again."
    };
    f.render_widget(
      Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray)),
      inner,
    );
    return;
  };

  f.render_widget(
    Paragraph::new(card_lines(card)).wrap(Wrap { trim: false }),
    inner,
  );
}

fn card_lines(card: &CandidateCard) -> Vec<Line<'static>> {
  let profile = &card.profile;
  let mut heading = vec![Span::styled(
    profile.display_name.clone(),
    Style::default().add_modifier(Modifier::BOLD),
  )];
  if let Some(age) = profile.age {
    heading.push(Span::raw(format!(", {age}")));
  }

  let mut lines = vec![
    Line::from(heading),
    Line::from(Span::styled(
      profile.location.clone().unwrap_or_default(),
      Style::default().fg(Color::Gray),
    )),
    Line::from(vec![
      Span::styled(
        format!("{}% match", card.match_score),
        Style::default()
          .fg(score_color(card.match_score))
          .add_modifier(Modifier::BOLD),
      ),
      Span::styled(
        format!("  · {} mutual", card.mutual_connections),
        Style::default().fg(Color::DarkGray),
      ),
    ]),
    Line::from(""),
  ];

  if let Some(bio) = &profile.bio {
    lines.push(Line::from(bio.clone()));
    lines.push(Line::from(""));
  }

  for category in Category::iter() {
    let items = profile.attributes.get(category);
    if items.is_empty() {
      continue;
    }
    lines.push(Line::from(vec![
      Span::styled(
        format!("{:<10}", category.to_string()),
        Style::default().fg(Color::DarkGray),
      ),
      Span::raw(items.iter().cloned().collect::<Vec<_>>().join(", ")),
    ]));
  }
  lines
}

fn score_color(score: u8) -> Color {
  match score {
    80.. => Color::Green,
    50..=79 => Color::Yellow,
    _ => Color::Red,
  }
}

#[cfg(test)]
mod tests {
  use ratatui::{Terminal, backend::TestBackend};
  use sames_core::profile::{AttributeSets, Profile, UserId};

  use super::*;

  fn render(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(70, 16)).unwrap();
    terminal
      .draw(|f| {
        let area = f.area();
        draw(f, area, app);
      })
      .unwrap();
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  #[test]
  fn card_lists_nonempty_categories() {
    let card = CandidateCard {
      profile:            Profile {
        id:           UserId(2),
        display_name: "Alex".into(),
        age:          Some(28),
        location:     Some("Brooklyn, NY".into()),
        bio:          None,
        attributes:   AttributeSets::default().with(Category::Likes, ["Coffee"]),
      },
      match_score:        92,
      mutual_connections: 5,
    };
    let text: String = card_lines(&card)
      .iter()
      .flat_map(|l| l.spans.iter().map(|s| s.content.to_string()))
      .collect();
    assert!(text.contains("Alex, 28"));
    assert!(text.contains("92% match"));
    assert!(text.contains("likes"));
    assert!(text.contains("Coffee"));
    assert!(!text.contains("fears"));
  }

  #[test]
  fn empty_deck_prompts_reload() {
    let mut app = crate::app::tests::app();
    app.deck.load_queue(Vec::new());
    assert!(render(&app).contains("No candidates yet"));
  }
}
