/////////////////////
/// ACTTIMER - a playlist countdown timer
///
/// Walks a configured list of persons through a shared, ordered sequence of
/// timed "acts" (speaking slots), counting each one down a second at a time.
/// - 'space' or 'enter' skips to the next act (also clears a pause)
/// - 'p' pauses / resumes the countdown
/// - '+' or '=' makes the person line bigger, '-' or '_' smaller
/// - 'q' or 'esc' quits
///
/// The config file path is the first command line argument.
///
pub const APP_VERSION: &str = "ACTTIMER V0.1.0";
pub const TICK_INTERVAL_MS: u64 = 1000;       // One countdown decrement per tick
const LOG_FILE_NAME: &str = "acttimer.log";
const CONF_SECTION: &str = "timer";
const DONE_LABEL: &str = "Done";

// Cosmetic font handling
const DEFAULT_FONT_SIZE: i64 = 25;            // Matches the original desktop default
const MIN_FONT_SIZE: i64 = 8;
const FONT_STEP: i64 = 1;
const BIG_FONT_THRESHOLD: i64 = 18;           // Below this the person line is plain text

use std::time::Duration;
#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::*;
use std::fs::File;
#[macro_use]
extern crate ini;

use color_eyre::eyre::{eyre, Result};
use futures::{FutureExt, StreamExt};
use ratatui::{backend::CrosstermBackend as Backend, prelude::*, widgets::*};
use ratatui::style::Color; // the simplelog glob also exports a Color
use strum::EnumIs;
use tui_big_text::BigText;
use crossterm::event::{KeyEvent, KeyCode};
use rand::{thread_rng, seq::SliceRandom};
use build_time::build_time_local;

type IniSection = std::collections::HashMap<String, Option<String>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
  Error,
  Tick,
  Key(KeyEvent),
}

/// Where the playlist currently is. Done is terminal: no message leaves it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
enum PlayState {
  #[default]
  Running,
  Paused,
  Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Message {
  Skip,
  PauseToggle,
  FontUp,
  FontDown,
  Tick,
  Quit,
  Noop,
}

/// A named, timed stage every person goes through in the same order.
#[derive(Debug, Clone, PartialEq)]
struct Act {
  name: String,
  duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
struct TimerConfig {
  persons: Vec<String>,
  random: bool,
  acts: Vec<Act>,
  counter: bool,
  show_next: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  init_logging();

  let path = std::env::args()
    .nth(1)
    .ok_or_else(|| eyre!("config file path must be provided as the first argument"))?;
  let config = load_config(&path)?;

  let mut app = TimerApp::new(config);
  app.run().await?;

  println!("Thanks for using {} (built: {})\n", APP_VERSION, build_time_local!("%Y-%b-%d at %H:%M:%S"));
  Ok(())
}

fn init_logging() {
  let log_file = File::create(LOG_FILE_NAME).unwrap_or_else(|e| {
    eprintln!("Warning: Could not create log file: {}", e);
    eprintln!("Continuing with terminal logging only.");
    File::create("/dev/null").expect("Failed to open /dev/null")
  });

  CombinedLogger::init(
    vec![
      TermLogger::new(LevelFilter::Warn, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
      WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ]
  ).unwrap_or_else(|e| {
    eprintln!("Warning: Could not initialize logger: {}", e);
  });

  info!("Logging for {} initialized (tick interval: {}ms)", APP_VERSION, TICK_INTERVAL_MS);
}

/// Parse a duration literal such as "1m30s", "2h" or "45s". Components are
/// integers with an 'h', 'm' or 's' unit; at least one component is required
/// and a trailing bare number is rejected.
fn parse_duration(s: &str) -> Result<Duration> {
  let text = s.trim();
  let mut total: u64 = 0;
  let mut digits = String::new();
  let mut components = 0;
  for c in text.chars() {
    if c.is_ascii_digit() {
      digits.push(c);
      continue;
    }
    let unit = match c {
      'h' => 3600,
      'm' => 60,
      's' => 1,
      _ => return Err(eyre!("unknown unit '{}' in duration '{}'", c, text)),
    };
    if digits.is_empty() {
      return Err(eyre!("unit '{}' has no value in duration '{}'", c, text));
    }
    let value: u64 = digits.parse()?;
    total += value * unit;
    digits.clear();
    components += 1;
  }
  if components == 0 || !digits.is_empty() {
    return Err(eyre!("invalid duration literal '{}'", text));
  }
  Ok(Duration::from_secs(total))
}

/// Parse the ordered act list, written as "name:duration, name:duration".
/// A bad duration fails the whole load, naming the offending act.
fn parse_acts(raw: &str) -> Result<Vec<Act>> {
  let mut acts = Vec::new();
  for entry in raw.split(',') {
    let entry = entry.trim();
    if entry.is_empty() {
      continue;
    }
    let (name, time) = entry
      .split_once(':')
      .ok_or_else(|| eyre!("act '{}' must be written as name:duration", entry))?;
    let name = name.trim();
    let duration = parse_duration(time)
      .map_err(|e| eyre!("act '{}' has a bad duration: {}", name, e))?;
    acts.push(Act { name: name.to_string(), duration });
  }
  if acts.is_empty() {
    return Err(eyre!("the act list is empty"));
  }
  Ok(acts)
}

fn parse_flag(section: &IniSection, key: &str) -> bool {
  match section.get(key).and_then(|v| v.as_ref()) {
    Some(val) => val.parse::<bool>().unwrap_or_else(|_| {
      warn!("Config value '{}' = '{}' is not a bool, treating it as false", key, val);
      false
    }),
    None => false,
  }
}

fn load_config(path: &str) -> Result<TimerConfig> {
  info!("Reading config from {}", path);
  let inimap = ini!(safe path)
    .map_err(|error| eyre!("failed to load config file '{}': {}", path, error))?;

  // List all the config
  for (key, value) in &inimap {
    info!("{} / {:?}", key, value);
  }

  let section = inimap
    .get(CONF_SECTION)
    .ok_or_else(|| eyre!("config file '{}' has no [{}] section", path, CONF_SECTION))?;

  let persons: Vec<String> = match section.get("persons").and_then(|v| v.as_ref()) {
    Some(val) => val.split(',')
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .collect(),
    None => Vec::new(),
  };
  if persons.is_empty() {
    warn!("No persons configured, the timer will show '{}' immediately", DONE_LABEL);
  }

  let acts_raw = section
    .get("acts")
    .and_then(|v| v.as_ref())
    .ok_or_else(|| eyre!("config file '{}' is missing the 'acts' key", path))?;
  let acts = parse_acts(acts_raw)?;
  info!("Loaded {} acts for {} persons", acts.len(), persons.len());

  let mut config = TimerConfig {
    persons,
    random: parse_flag(section, "random"),
    acts,
    counter: parse_flag(section, "counter"),
    show_next: parse_flag(section, "next"),
  };
  if config.counter {
    info!("'counter' flag is set but has no effect");
  }
  if config.random {
    config.persons.shuffle(&mut thread_rng());
    info!("Shuffled {} persons", config.persons.len());
  }
  Ok(config)
}

/// A renderable view of the playback state, pulled after every tick or intent.
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
  person: String,
  act: String,
  remaining_label: String,
  progress: f64,
  overall: f64,
  overall_label: String,
  next_label: String,
}

/// The playlist state machine. One person at a time, every person walking the
/// same ordered act list; all mutable playback fields live here and are only
/// touched from the main event loop.
#[derive(Debug, Clone, PartialEq)]
struct Session {
  persons: Vec<String>,
  acts: Vec<Act>,
  show_next: bool,
  person_index: usize,
  act_index: usize,
  remaining: Duration,
  total: Duration,
  state: PlayState,
}

impl Session {
  fn new(config: &TimerConfig) -> Self {
    let mut session = Self {
      persons: config.persons.clone(),
      acts: config.acts.clone(),
      show_next: config.show_next,
      person_index: 0,
      act_index: 0,
      remaining: Duration::ZERO,
      total: Duration::ZERO,
      state: PlayState::Running,
    };
    if session.persons.is_empty() {
      session.state = PlayState::Done;
    } else {
      session.arm_current_act();
    }
    session
  }

  fn arm_current_act(&mut self) {
    let duration = self.acts[self.act_index].duration;
    self.remaining = duration;
    self.total = duration;
  }

  /// One periodic decrement, clamped at zero. Paused and Done accept the
  /// tick but change nothing. Returns true when the countdown expired and a
  /// new act was armed, so the caller must restart the tick source.
  fn tick(&mut self) -> bool {
    if !self.state.is_running() {
      return false;
    }
    self.remaining = self.remaining.saturating_sub(Duration::from_secs(1));
    if self.remaining.is_zero() {
      return self.advance();
    }
    false
  }

  /// Move to the next act, the next person's first act, or Done. This is the
  /// only place person_index changes. Returns true when a new act was armed.
  fn advance(&mut self) -> bool {
    self.act_index += 1;
    if self.act_index >= self.acts.len() {
      self.act_index = 0;
      self.person_index += 1;
    }
    if self.person_index >= self.persons.len() {
      self.state = PlayState::Done;
      info!("Playlist finished after {} persons", self.persons.len());
      return false;
    }
    self.arm_current_act();
    true
  }

  /// Explicit user skip: clears a pause, then advances.
  fn skip(&mut self) -> bool {
    if self.state.is_done() {
      return false;
    }
    self.state = PlayState::Running;
    self.advance()
  }

  fn toggle_pause(&mut self) {
    self.state = match self.state {
      PlayState::Running => PlayState::Paused,
      PlayState::Paused => PlayState::Running,
      PlayState::Done => PlayState::Done,
    };
  }

  /// Share of the current act still to run, always within [0, 1].
  fn progress_fraction(&self) -> f64 {
    if self.total.is_zero() {
      return 0.0;
    }
    (self.remaining.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0)
  }

  /// Share of the playlist reached so far, as (person_index + 1) / persons.
  fn overall_fraction(&self) -> f64 {
    if self.persons.is_empty() {
      return 1.0;
    }
    ((self.person_index as f64 + 1.0) / self.persons.len() as f64).min(1.0)
  }

  fn overall_label(&self) -> String {
    let shown = (self.person_index + 1).min(self.persons.len());
    format!("{} / {}", shown, self.persons.len())
  }

  fn next_label(&self) -> String {
    if !self.show_next || self.state.is_done() {
      return String::new();
    }
    if self.person_index + 1 >= self.persons.len() {
      "Next: Last".to_string()
    } else {
      format!("Next: {}", self.persons[self.person_index + 1])
    }
  }

  fn format_remaining(&self) -> String {
    let secs = self.remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
  }

  fn snapshot(&self) -> Snapshot {
    if self.state.is_done() {
      return Snapshot {
        person: DONE_LABEL.to_string(),
        act: String::new(),
        remaining_label: "00:00".to_string(),
        progress: 0.0,
        overall: self.overall_fraction(),
        overall_label: self.overall_label(),
        next_label: String::new(),
      };
    }
    Snapshot {
      person: self.persons[self.person_index].clone(),
      act: self.acts[self.act_index].name.clone(),
      remaining_label: self.format_remaining(),
      progress: self.progress_fraction(),
      overall: self.overall_fraction(),
      overall_label: self.overall_label(),
      next_label: self.next_label(),
    }
  }
}

/// Visual styling hooks for the widgets that carry colour.
trait Theme {
  fn person(&self) -> Style;
  fn act(&self) -> Style;
  fn next(&self) -> Style;
  fn timer(&self) -> Style;
  fn gauge_fill(&self) -> Style;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BaseTheme;

impl Theme for BaseTheme {
  fn person(&self) -> Style {
    Style::new().gray()
  }
  fn act(&self) -> Style {
    Style::new().fg(Color::Rgb(144, 238, 144)) // light green
  }
  fn next(&self) -> Style {
    Style::new().fg(Color::Rgb(255, 255, 153)) // pale yellow
  }
  fn timer(&self) -> Style {
    Style::new().gray()
  }
  fn gauge_fill(&self) -> Style {
    Style::new().fg(Color::Blue)
  }
}

/// Overrides the gauge fill colour and delegates every other property to the
/// wrapped base theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RedGauge<T: Theme> {
  base: T,
}

impl<T: Theme> Theme for RedGauge<T> {
  fn person(&self) -> Style {
    self.base.person()
  }
  fn act(&self) -> Style {
    self.base.act()
  }
  fn next(&self) -> Style {
    self.base.next()
  }
  fn timer(&self) -> Style {
    self.base.timer()
  }
  fn gauge_fill(&self) -> Style {
    Style::new().fg(Color::Red)
  }
}

#[derive(Debug, Clone, PartialEq)]
struct TimerApp {
  session: Session,
  theme: RedGauge<BaseTheme>,
  font_size: i64,
  quitting: bool,
}

impl TimerApp {
  fn new(config: TimerConfig) -> Self {
    Self {
      session: Session::new(&config),
      theme: RedGauge { base: BaseTheme },
      font_size: DEFAULT_FONT_SIZE,
      quitting: false,
    }
  }

  async fn run(&mut self) -> Result<()> {
    let mut tui = Tui::new()?;
    tui.enter()?;
    while !self.quitting {
      tui.draw(|f| self.ui(f).expect("Unexpected error during drawing"))?;
      let event = tui.next().await.ok_or(eyre!("Unable to get event"))?; // blocks until next event
      let message = self.handle_event(event);
      if self.update(message) {
        // A new act was armed: stop the old tick source before starting the
        // fresh one, so only a single cadence ever decrements the countdown.
        tui.start();
      }
    }
    tui.exit()?;
    Ok(())
  }

  // Event handler (keyboard, tick)
  fn handle_event(&self, event: Event) -> Message {
    match event {
      Event::Key(key) => {
        match key.code {
          KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Message::Quit,
          KeyCode::Char('p') | KeyCode::Char('P') => Message::PauseToggle,
          KeyCode::Char(' ') | KeyCode::Enter => Message::Skip,
          KeyCode::Char('+') | KeyCode::Char('=') => Message::FontUp,
          KeyCode::Char('-') | KeyCode::Char('_') => Message::FontDown,
          _ => Message::Noop,
        }
      },
      Event::Tick => Message::Tick,
      Event::Error => Message::Noop,
    }
  }

  /// Apply one message. Returns true when the tick source must be re-armed.
  fn update(&mut self, message: Message) -> bool {
    match message {
      Message::Skip => self.session.skip(),
      Message::PauseToggle => {
        self.session.toggle_pause();
        false
      }
      Message::FontUp => {
        self.font_size += FONT_STEP;
        false
      }
      Message::FontDown => {
        self.font_size = (self.font_size - FONT_STEP).max(MIN_FONT_SIZE);
        false
      }
      Message::Tick => self.session.tick(),
      Message::Quit => {
        self.quitting = true;
        false
      }
      Message::Noop => false,
    }
  }

  fn ui(&self, f: &mut Frame) -> Result<()> {
    let snapshot = self.session.snapshot();
    let layout = self.layout(f.size());
    f.render_widget(self.title_paragraph(), layout[0]);
    if self.font_size >= BIG_FONT_THRESHOLD {
      f.render_widget(self.person_big_text(&snapshot)?, layout[1]);
    } else {
      f.render_widget(self.person_paragraph(&snapshot), layout[1]);
    }
    f.render_widget(self.act_paragraph(&snapshot), layout[2]);
    f.render_widget(self.timer_big_text(&snapshot)?, layout[3]);
    f.render_widget(self.act_gauge(&snapshot), layout[4]);
    f.render_widget(self.overall_gauge(&snapshot), layout[5]);
    f.render_widget(self.next_paragraph(&snapshot), layout[6]);
    f.render_widget(self.help_paragraph(), layout[7]);
    Ok(())
  }

  fn layout(&self, area: Rect) -> Vec<Rect> {
    let layout = Layout::default()
      .direction(Direction::Vertical)
      .constraints(vec![
        Constraint::Length(1), // title
        Constraint::Length(8), // person
        Constraint::Length(1), // act name
        Constraint::Length(8), // countdown
        Constraint::Length(3), // act progress
        Constraint::Length(3), // overall progress
        Constraint::Length(1), // next person
        Constraint::Length(2), // help
      ])
      .split(area);

    layout.to_vec()
  }

  fn title_paragraph(&self) -> Paragraph<'_> {
    let title_text =
      Line::from(vec![APP_VERSION.into(), " - one ".into(), "act".dim(), " at a time".into()]);
    Paragraph::new(title_text).gray()
  }

  fn person_big_text(&self, snapshot: &Snapshot) -> Result<BigText<'_>> {
    let lines = vec![snapshot.person.clone().into()];
    let text = tui_big_text::BigTextBuilder::default()
      .lines(lines)
      .style(self.theme.person())
      .build()?;
    Ok(text)
  }

  fn person_paragraph(&self, snapshot: &Snapshot) -> Paragraph<'_> {
    Paragraph::new(snapshot.person.clone()).style(self.theme.person())
  }

  fn act_paragraph(&self, snapshot: &Snapshot) -> Paragraph<'_> {
    Paragraph::new(snapshot.act.clone()).style(self.theme.act())
  }

  fn timer_big_text(&self, snapshot: &Snapshot) -> Result<BigText<'_>> {
    let lines = vec![snapshot.remaining_label.clone().into()];
    let text = tui_big_text::BigTextBuilder::default()
      .lines(lines)
      .style(self.theme.timer())
      .build()?;
    Ok(text)
  }

  fn act_gauge(&self, snapshot: &Snapshot) -> Gauge<'_> {
    Gauge::default()
      .block(Block::default().borders(Borders::ALL).title("Act"))
      .gauge_style(self.theme.gauge_fill())
      .ratio(snapshot.progress)
      .label(snapshot.remaining_label.clone())
  }

  fn overall_gauge(&self, snapshot: &Snapshot) -> Gauge<'_> {
    Gauge::default()
      .block(Block::default().borders(Borders::ALL).title("Overall"))
      .gauge_style(self.theme.gauge_fill())
      .ratio(snapshot.overall)
      .label(snapshot.overall_label.clone())
  }

  fn next_paragraph(&self, snapshot: &Snapshot) -> Paragraph<'_> {
    Paragraph::new(snapshot.next_label.clone()).style(self.theme.next())
  }

  fn help_paragraph(&self) -> Paragraph<'_> {
    let pause_action = if self.session.state.is_paused() { "resume" } else { "pause" };
    let help_text =
      Line::from(vec!["space ".into(), "next".dim(), " : p ".into(), pause_action.dim(),
        " : + ".into(), "bigger".dim(), " : - ".into(), "smaller".dim(),
        " : q ".into(), "quit".dim()]);
    Paragraph::new(help_text).gray()
  }
}

/// Terminal plumbing: one background task multiplexes the one-second tick
/// interval with the crossterm key stream and funnels both through a single
/// channel, so ticks and user intents are serialized on the main loop.
struct Tui {
  pub terminal: Terminal<Backend<std::io::Stderr>>,
  pub task: tokio::task::JoinHandle<()>,
  pub cancellation_token: tokio_util::sync::CancellationToken,
  pub event_rx: tokio::sync::mpsc::UnboundedReceiver<Event>,
  pub event_tx: tokio::sync::mpsc::UnboundedSender<Event>,
}

impl Tui {
  fn new() -> Result<Tui> {
    let mut terminal = ratatui::Terminal::new(Backend::new(std::io::stderr()))?;
    terminal.clear()?;
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let cancellation_token = tokio_util::sync::CancellationToken::new();
    let task = tokio::spawn(async {});
    Ok(Self { terminal, task, cancellation_token, event_rx, event_tx })
  }

  pub async fn next(&mut self) -> Option<Event> {
    self.event_rx.recv().await
  }

  pub fn enter(&mut self) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stderr(), crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    self.start();
    Ok(())
  }

  pub fn exit(&self) -> Result<()> {
    self.stop()?;
    crossterm::execute!(std::io::stderr(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    crossterm::terminal::disable_raw_mode()?;
    Ok(())
  }

  pub fn cancel(&self) {
    self.cancellation_token.cancel();
  }

  pub fn stop(&self) -> Result<()> {
    self.cancel();
    let mut counter = 0;
    while !self.task.is_finished() {
      std::thread::sleep(Duration::from_millis(250));
      counter += 1;
      if counter > 5 {
        self.task.abort();
      }
      if counter > 10 {
        log::error!("Failed to abort task for unknown reason");
        return Err(eyre!("Unable to abort task"));
      }
    }
    Ok(())
  }

  /// Drop ticks a cancelled event task had already queued, keeping any key
  /// or error events in order.
  fn drain_stale_ticks(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<Event>,
    tx: &tokio::sync::mpsc::UnboundedSender<Event>,
  ) {
    let mut kept = Vec::new();
    while let Ok(event) = rx.try_recv() {
      if event != Event::Tick {
        kept.push(event);
      }
    }
    for event in kept {
      if let Err(e) = tx.send(event) {
        log::error!("Failed to requeue event: {}", e);
      }
    }
  }

  /// (Re)arm the event task. The previous task is cancelled and waited out
  /// first, and its queued ticks dropped, so a skip or a stage advance
  /// restarts the one-second cadence from zero elapsed and two tick sources
  /// never overlap.
  pub fn start(&mut self) {
    let tick_rate = Duration::from_millis(TICK_INTERVAL_MS);
    self.cancel();
    let mut counter = 0;
    while !self.task.is_finished() {
      std::thread::sleep(Duration::from_millis(1));
      counter += 1;
      if counter > 250 {
        self.task.abort();
        break;
      }
    }
    Self::drain_stale_ticks(&mut self.event_rx, &self.event_tx);
    self.cancellation_token = tokio_util::sync::CancellationToken::new();
    let token = self.cancellation_token.clone();
    let tx = self.event_tx.clone();
    self.task = tokio::spawn(async move {
      let mut reader = crossterm::event::EventStream::new();
      let mut interval = tokio::time::interval(tick_rate);
      interval.tick().await; // the first interval tick completes immediately
      loop {
        let delay = interval.tick();
        let crossterm_event = reader.next().fuse();
        tokio::select! {
          _ = token.cancelled() => {
            break;
          }
          maybe_event = crossterm_event => {
            match maybe_event {
              Some(Ok(crossterm::event::Event::Key(key))) => {
                if key.kind == crossterm::event::KeyEventKind::Press {
                    if let Err(e) = tx.send(Event::Key(key)) {
                      log::error!("Failed to send key event: {}", e);
                    }
                }
              }
              Some(Ok(_)) => { }
              Some(Err(_)) => {
                if let Err(e) = tx.send(Event::Error) {
                  log::error!("Failed to send error event: {}", e);
                }
              }
              None => {},
            }
          },
          _ = delay => {
              if let Err(e) = tx.send(Event::Tick) {
                log::error!("Failed to send tick event: {}", e);
              }
          },
        }
      }
    });
  }
}

impl std::ops::Deref for Tui {
  type Target = ratatui::Terminal<Backend<std::io::Stderr>>;

  fn deref(&self) -> &Self::Target {
    &self.terminal
  }
}

impl std::ops::DerefMut for Tui {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.terminal
  }
}

impl Drop for Tui {
  fn drop(&mut self) {
    if let Err(e) = self.exit() {
      eprintln!("Error during cleanup: {}", e);
      // Don't panic in Drop - just log the error
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_config(persons: &[&str], acts: &[(&str, u64)]) -> TimerConfig {
    TimerConfig {
      persons: persons.iter().map(|s| s.to_string()).collect(),
      random: false,
      acts: acts.iter()
        .map(|(name, secs)| Act { name: name.to_string(), duration: Duration::from_secs(*secs) })
        .collect(),
      counter: false,
      show_next: true,
    }
  }

  fn session(persons: &[&str], acts: &[(&str, u64)]) -> Session {
    Session::new(&test_config(persons, acts))
  }

  #[test]
  fn test_start_arms_first_act() {
    let s = session(&["A", "B"], &[("intro", 2), ("main", 1)]);
    assert_eq!(s.state, PlayState::Running);
    assert_eq!(s.person_index, 0);
    assert_eq!(s.act_index, 0);
    assert_eq!(s.remaining, Duration::from_secs(2));
    assert_eq!(s.total, Duration::from_secs(2));
  }

  #[test]
  fn test_start_with_no_persons_is_done() {
    let s = session(&[], &[("intro", 2)]);
    assert_eq!(s.state, PlayState::Done);
    assert_eq!(s.snapshot().person, DONE_LABEL);
  }

  #[test]
  fn test_tick_decrements_by_one_second() {
    let mut s = session(&["A"], &[("intro", 3)]);
    assert!(!s.tick());
    assert_eq!(s.remaining, Duration::from_secs(2));
    assert!(!s.tick());
    assert_eq!(s.remaining, Duration::from_secs(1));
  }

  #[test]
  fn test_expiry_advances_exactly_once() {
    let mut s = session(&["A"], &[("intro", 2), ("main", 5)]);
    assert!(!s.tick());
    // second tick hits zero and advances into "main" in the same call
    assert!(s.tick());
    assert_eq!(s.act_index, 1);
    assert_eq!(s.remaining, Duration::from_secs(5));
  }

  #[test]
  fn test_remaining_never_negative() {
    let mut s = session(&["A"], &[("solo", 1)]);
    s.tick();
    assert_eq!(s.state, PlayState::Done);
    for _ in 0..5 {
      s.tick();
      assert_eq!(s.remaining, Duration::ZERO);
    }
  }

  #[test]
  fn test_scenario_walkthrough() {
    let mut s = session(&["A", "B"], &[("intro", 2), ("main", 1)]);
    assert_eq!(s.snapshot().person, "A");
    assert_eq!(s.snapshot().act, "intro");
    assert_eq!(s.remaining, Duration::from_secs(2));

    s.tick();
    assert_eq!(s.remaining, Duration::from_secs(1));

    s.tick(); // hits zero, auto-advances to "main"
    assert_eq!(s.snapshot().act, "main");
    assert_eq!(s.remaining, Duration::from_secs(1));

    s.tick(); // hits zero, auto-advances to person B
    assert_eq!(s.snapshot().person, "B");
    assert_eq!(s.snapshot().act, "intro");
    assert_eq!(s.remaining, Duration::from_secs(2));
    assert_eq!(s.overall_fraction(), 1.0);
  }

  #[test]
  fn test_skip_at_start_bumps_act_without_decrement() {
    let mut s = session(&["A", "B"], &[("intro", 2), ("main", 1)]);
    assert!(s.skip());
    assert_eq!(s.snapshot().person, "A");
    assert_eq!(s.snapshot().act, "main");
    assert_eq!(s.remaining, Duration::from_secs(1));
  }

  #[test]
  fn test_skip_clears_pause() {
    let mut s = session(&["A"], &[("intro", 2), ("main", 1)]);
    s.toggle_pause();
    assert_eq!(s.state, PlayState::Paused);
    s.skip();
    assert_eq!(s.state, PlayState::Running);
    assert_eq!(s.act_index, 1);
  }

  #[test]
  fn test_skip_on_last_act_of_last_person_is_done() {
    let mut s = session(&["A"], &[("only", 5)]);
    assert!(!s.skip());
    assert_eq!(s.state, PlayState::Done);

    // further ticks and skips are no-ops
    let frozen = s.clone();
    assert!(!s.tick());
    assert!(!s.skip());
    s.toggle_pause();
    assert_eq!(s, frozen);
  }

  #[test]
  fn test_toggle_pause_twice_restores_state() {
    let mut s = session(&["A", "B"], &[("intro", 2)]);
    s.tick();
    let before = s.clone();
    s.toggle_pause();
    assert_eq!(s.state, PlayState::Paused);
    s.toggle_pause();
    assert_eq!(s, before);
  }

  #[test]
  fn test_pause_suppresses_tick() {
    let mut s = session(&["A"], &[("intro", 3)]);
    s.toggle_pause();
    for _ in 0..10 {
      assert!(!s.tick());
    }
    assert_eq!(s.remaining, Duration::from_secs(3));
    assert_eq!(s.act_index, 0);
  }

  #[test]
  fn test_progress_fraction_stays_in_range() {
    let mut s = session(&["A", "B"], &[("intro", 3), ("main", 1)]);
    for step in 0..20 {
      let fraction = s.progress_fraction();
      assert!((0.0..=1.0).contains(&fraction), "fraction {} out of range", fraction);
      if step % 4 == 0 {
        s.toggle_pause();
        s.toggle_pause();
      }
      s.tick();
    }
  }

  #[test]
  fn test_progress_fraction_zero_total() {
    let s = session(&["A"], &[("flash", 0)]);
    assert_eq!(s.progress_fraction(), 0.0);
  }

  #[test]
  fn test_zero_duration_act_advances_on_first_tick() {
    let mut s = session(&["A"], &[("flash", 0), ("real", 5)]);
    assert!(s.tick());
    assert_eq!(s.snapshot().act, "real");
    assert_eq!(s.remaining, Duration::from_secs(5));
  }

  #[test]
  fn test_overall_fraction_tracks_person_index() {
    let mut s = session(&["A", "B", "C", "D"], &[("x", 1)]);
    assert_eq!(s.overall_fraction(), 0.25);
    s.tick();
    assert_eq!(s.overall_fraction(), 0.5);
    s.skip();
    assert_eq!(s.overall_fraction(), 0.75);
    s.skip();
    assert_eq!(s.overall_fraction(), 1.0);
    s.skip(); // into Done, stays clamped
    assert_eq!(s.state, PlayState::Done);
    assert_eq!(s.overall_fraction(), 1.0);
  }

  #[test]
  fn test_overall_label() {
    let mut s = session(&["A", "B"], &[("x", 1)]);
    assert_eq!(s.overall_label(), "1 / 2");
    s.skip();
    assert_eq!(s.overall_label(), "2 / 2");
    s.skip(); // Done keeps the clamped label
    assert_eq!(s.overall_label(), "2 / 2");
  }

  #[test]
  fn test_next_label_variants() {
    let mut s = session(&["A", "B"], &[("x", 1)]);
    assert_eq!(s.next_label(), "Next: B");
    s.skip();
    assert_eq!(s.next_label(), "Next: Last");

    let mut quiet = Session::new(&TimerConfig {
      show_next: false,
      ..test_config(&["A", "B"], &[("x", 1)])
    });
    assert_eq!(quiet.next_label(), "");
    quiet.skip();
    assert_eq!(quiet.next_label(), "");
  }

  #[test]
  fn test_done_snapshot() {
    let mut s = session(&["A"], &[("x", 1)]);
    s.skip();
    let snapshot = s.snapshot();
    assert_eq!(snapshot.person, DONE_LABEL);
    assert_eq!(snapshot.act, "");
    assert_eq!(snapshot.next_label, "");
    assert_eq!(snapshot.progress, 0.0);
    assert_eq!(snapshot.overall, 1.0);
  }

  #[test]
  fn test_format_remaining() {
    let mut s = session(&["A"], &[("x", 90)]);
    assert_eq!(s.format_remaining(), "01:30");
    s.tick();
    assert_eq!(s.format_remaining(), "01:29");
  }

  #[test]
  fn test_parse_duration_literals() {
    assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
    assert_eq!(parse_duration("1h2m3s").unwrap(), Duration::from_secs(3723));
    assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
  }

  #[test]
  fn test_parse_duration_rejects_bad_literals() {
    assert!(parse_duration("").is_err());
    assert!(parse_duration("90").is_err());     // bare number, no unit
    assert!(parse_duration("1x").is_err());     // unknown unit
    assert!(parse_duration("m").is_err());      // unit without value
    assert!(parse_duration("10m5").is_err());   // trailing bare number
  }

  #[test]
  fn test_parse_acts_preserves_order() {
    let acts = parse_acts("intro:1m30s, main:45s").unwrap();
    assert_eq!(acts.len(), 2);
    assert_eq!(acts[0].name, "intro");
    assert_eq!(acts[0].duration, Duration::from_secs(90));
    assert_eq!(acts[1].name, "main");
    assert_eq!(acts[1].duration, Duration::from_secs(45));
  }

  #[test]
  fn test_parse_acts_rejects_bad_entries() {
    assert!(parse_acts("").is_err());
    assert!(parse_acts("solo").is_err()); // missing the duration
    let err = parse_acts("intro:abc").unwrap_err();
    assert!(err.to_string().contains("intro"));
  }

  #[test]
  fn test_update_skip_requests_rearm() {
    let mut app = TimerApp::new(test_config(&["A"], &[("intro", 2), ("main", 1)]));
    assert!(app.update(Message::Skip));
    assert_eq!(app.session.act_index, 1);
    // final skip lands in Done, nothing left to arm
    assert!(!app.update(Message::Skip));
    assert_eq!(app.session.state, PlayState::Done);
  }

  #[test]
  fn test_update_tick_requests_rearm_on_advance() {
    let mut app = TimerApp::new(test_config(&["A"], &[("intro", 1), ("main", 1)]));
    assert!(app.update(Message::Tick));
    assert_eq!(app.session.act_index, 1);
  }

  #[test]
  fn test_update_font_size_is_cosmetic() {
    let mut app = TimerApp::new(test_config(&["A"], &[("intro", 2)]));
    let before = app.session.clone();
    assert!(!app.update(Message::FontUp));
    assert_eq!(app.font_size, DEFAULT_FONT_SIZE + FONT_STEP);
    app.font_size = MIN_FONT_SIZE;
    assert!(!app.update(Message::FontDown));
    assert_eq!(app.font_size, MIN_FONT_SIZE);
    assert_eq!(app.session, before);
  }

  #[test]
  fn test_update_quit() {
    let mut app = TimerApp::new(test_config(&["A"], &[("intro", 2)]));
    assert!(!app.update(Message::Quit));
    assert!(app.quitting);
  }

  #[test]
  fn test_handle_event_key_mapping() {
    let app = TimerApp::new(test_config(&["A"], &[("intro", 2)]));
    let key = |code| app.handle_event(Event::Key(KeyEvent::from(code)));
    assert_eq!(key(KeyCode::Char(' ')), Message::Skip);
    assert_eq!(key(KeyCode::Enter), Message::Skip);
    assert_eq!(key(KeyCode::Char('p')), Message::PauseToggle);
    assert_eq!(key(KeyCode::Char('+')), Message::FontUp);
    assert_eq!(key(KeyCode::Char('-')), Message::FontDown);
    assert_eq!(key(KeyCode::Char('q')), Message::Quit);
    assert_eq!(key(KeyCode::Esc), Message::Quit);
    assert_eq!(key(KeyCode::Char('z')), Message::Noop);
    assert_eq!(app.handle_event(Event::Tick), Message::Tick);
    assert_eq!(app.handle_event(Event::Error), Message::Noop);
  }

  #[test]
  fn test_red_gauge_overrides_only_the_fill() {
    let theme = RedGauge { base: BaseTheme };
    assert_eq!(theme.gauge_fill(), Style::new().fg(Color::Red));
    assert_eq!(theme.person(), BaseTheme.person());
    assert_eq!(theme.act(), BaseTheme.act());
    assert_eq!(theme.next(), BaseTheme.next());
    assert_eq!(theme.timer(), BaseTheme.timer());
  }

  #[test]
  fn test_big_text_widgets_build() {
    let app = TimerApp::new(test_config(&["A"], &[("intro", 90)]));
    let snapshot = app.session.snapshot();
    assert!(app.person_big_text(&snapshot).is_ok());
    assert!(app.timer_big_text(&snapshot).is_ok());
  }

  #[test]
  fn test_rearm_drops_queued_ticks_but_keeps_keys() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(Event::Tick).unwrap();
    tx.send(Event::Key(KeyEvent::from(KeyCode::Char('p')))).unwrap();
    tx.send(Event::Tick).unwrap();
    tx.send(Event::Error).unwrap();

    Tui::drain_stale_ticks(&mut rx, &tx);

    assert_eq!(rx.try_recv().unwrap(), Event::Key(KeyEvent::from(KeyCode::Char('p'))));
    assert_eq!(rx.try_recv().unwrap(), Event::Error);
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn test_parse_flag() {
    let mut section = IniSection::new();
    section.insert("random".to_string(), Some("true".to_string()));
    section.insert("next".to_string(), Some("nope".to_string()));
    assert!(parse_flag(&section, "random"));
    assert!(!parse_flag(&section, "false_missing"));
    assert!(!parse_flag(&section, "next"));
  }
}
