use std::{collections::VecDeque, io, thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use teams_core::{
    chat::{chat_channel, ChatEvent, ChatInbox, ChatSender},
    host::MemoryHost,
    text, ChatRoute, Host, ParticipantId, TeamService,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::console::{ConsoleInput, VERB_HELP};

const TICK_RATE: Duration = Duration::from_millis(250);
const LOG_CAPACITY: usize = 500;
const HISTORY_CAPACITY: usize = 50;
const MAX_INPUT_LEN: usize = 256;

#[derive(Debug, Clone, Copy)]
struct Theme {
    text: Color,
    accent: Color,
    muted: Color,
    danger: Color,
    success: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            danger: Color::Red,
            success: Color::Green,
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogKind {
    /// Delivered to one participant by the add-on.
    Delivery,
    /// Public chat seen by everyone.
    Public,
    /// Console feedback.
    System,
    Error,
}

#[derive(Debug, Clone)]
struct LogLine {
    stamp: String,
    kind: LogKind,
    /// Recipient name for deliveries.
    to: Option<String>,
    message: String,
}

#[derive(Debug, Default)]
struct InputLine {
    buffer: String,
    cursor: usize,
    history: VecDeque<String>,
    history_pos: Option<usize>,
}

impl InputLine {
    fn move_cursor(&mut self, delta: isize) {
        let len = self.buffer.len() as isize;
        let next = (self.cursor as isize + delta).clamp(0, len);
        self.cursor = next as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }

    fn insert(&mut self, ch: char) {
        if self.buffer.len() >= MAX_INPUT_LEN {
            return;
        }
        if ch.is_ascii() && !ch.is_ascii_control() {
            self.buffer.insert(self.cursor, ch);
            self.cursor += 1;
        }
    }

    fn backspace(&mut self) {
        if self.cursor > 0 && self.cursor <= self.buffer.len() {
            self.cursor -= 1;
            self.buffer.remove(self.cursor);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_pos = None;
    }

    /// Take the typed line and remember it for recall.
    fn submit(&mut self) -> String {
        let line = std::mem::take(&mut self.buffer);
        self.cursor = 0;
        self.history_pos = None;
        if !line.trim().is_empty() && self.history.front() != Some(&line) {
            self.history.push_front(line.clone());
            self.history.truncate(HISTORY_CAPACITY);
        }
        line
    }

    fn recall(&mut self, older: bool) {
        let next = match (self.history_pos, older) {
            (None, true) if !self.history.is_empty() => Some(0),
            (None, _) => return,
            (Some(pos), true) => Some((pos + 1).min(self.history.len().saturating_sub(1))),
            (Some(0), false) => None,
            (Some(pos), false) => Some(pos - 1),
        };
        self.history_pos = next;
        self.buffer = next
            .and_then(|pos| self.history.get(pos).cloned())
            .unwrap_or_default();
        self.cursor = self.buffer.len();
    }
}

pub struct TeamsApp {
    service: TeamService,
    host: MemoryHost,
    active: Option<ParticipantId>,
    log: VecDeque<LogLine>,
    input: InputLine,
    status: String,
    chat_tx: ChatSender,
    chat_rx: Option<ChatInbox>,
    theme: Theme,
    should_quit: bool,
}

impl TeamsApp {
    pub fn new(service: TeamService, host: MemoryHost, loaded: usize) -> Self {
        let (chat_tx, chat_rx) = chat_channel();
        let status = format!(
            "Loaded {loaded} teams • server {} • type :help",
            host.server_version()
        );
        Self {
            service,
            host,
            active: None,
            log: VecDeque::new(),
            input: InputLine::default(),
            status,
            chat_tx,
            chat_rx: Some(chat_rx),
            theme: Theme::default(),
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.push_system("Log in with :login <name>, then type chat or /team commands.");

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let mut inbox = self
            .chat_rx
            .take()
            .ok_or_else(|| anyhow!("chat inbox already taken"))?;

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    if !self.process_app_event(maybe_event) {
                        break;
                    }
                }
                maybe_chat = inbox.recv() => {
                    if let Some(event) = maybe_chat {
                        self.route_chat(event);
                    }
                }
            }
        }

        restore_terminal(&mut terminal)?;
        self.service.save().context("failed to save teams")?;
        info!("Saved teams on exit");
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) => {
                if key.kind != KeyEventKind::Release {
                    self.handle_key(key);
                }
                true
            }
            Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => true,
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Enter => {
                let line = self.input.submit();
                if let Err(err) = self.submit_line(&line) {
                    self.push_error(err.to_string());
                }
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Left => self.input.move_cursor(-1),
            KeyCode::Right => self.input.move_cursor(1),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            KeyCode::Up => self.input.recall(true),
            KeyCode::Down => self.input.recall(false),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.input.insert(ch);
                }
            }
            _ => {}
        }
    }

    fn submit_line(&mut self, line: &str) -> Result<()> {
        let Some(input) = ConsoleInput::parse(line)? else {
            return Ok(());
        };
        match input {
            ConsoleInput::Say(message) => {
                let sender = self.require_active()?;
                if !self.chat_tx.try_send(sender, message) {
                    warn!("Chat buffer full, dropped line");
                    return Err(anyhow!("chat buffer full, try again"));
                }
            }
            ConsoleInput::Login(name) => {
                let id = self.host.connect(&name);
                self.active = Some(id);
                let name = self.host.display_name(id);
                self.push_system(format!("{name} joined the server"));
                let invites = self.service.registry().player_invite_names(id);
                if !invites.is_empty() {
                    self.host.send_message(
                        id,
                        &text::notice(format!("You have invites from: {}", invites.join(", "))),
                    );
                }
                self.set_status(format!("Acting as {name}"));
            }
            ConsoleInput::Logout(name) => {
                let id = match name {
                    Some(name) => self.find_player(&name)?,
                    None => self.require_active()?,
                };
                self.host.disconnect(id);
                self.service.player_quit(id);
                let name = self.host.display_name(id);
                if self.active == Some(id) {
                    self.active = None;
                    self.set_status("No active player");
                }
                self.push_system(format!("{name} left the server"));
            }
            ConsoleInput::As(name) => {
                let id = self.find_player(&name)?;
                if !self.host.is_online(id) {
                    return Err(anyhow!("{name} is offline"));
                }
                self.active = Some(id);
                self.set_status(format!("Acting as {}", self.host.display_name(id)));
            }
            ConsoleInput::Op(name) => {
                let id = self.find_player(&name)?;
                let operator = !self
                    .host
                    .player(id)
                    .map(|player| player.operator)
                    .unwrap_or(false);
                self.host.set_operator(id, operator);
                let verb = if operator { "is now" } else { "is no longer" };
                self.push_system(format!("{} {verb} an operator", self.host.display_name(id)));
            }
            ConsoleInput::Tp(location) => {
                let id = self.require_active()?;
                self.host.add_world(location.world.clone());
                let described = location.describe();
                self.host.move_to(id, location);
                self.push_system(format!("Moved {} to {described}", self.host.display_name(id)));
            }
            ConsoleInput::Hit(name) => {
                let attacker = self.require_active()?;
                let victim = self.find_player(&name)?;
                if self.service.allows_damage(attacker, victim) {
                    self.push_system(format!("{} hit {name}", self.host.display_name(attacker)));
                } else {
                    self.push_system(format!("Friendly fire: {name} took no damage"));
                }
            }
            ConsoleInput::Kill(name) => {
                let killer = self.require_active()?;
                let victim = self.find_player(&name)?;
                if !self.service.allows_damage(killer, victim) {
                    self.push_system(format!("Friendly fire: {name} took no damage"));
                } else {
                    self.service.record_kill(killer, victim);
                    self.push_system(format!(
                        "{} was slain by {}",
                        self.host.display_name(victim),
                        self.host.display_name(killer)
                    ));
                }
            }
            ConsoleInput::Players => {
                let lines: Vec<String> = self
                    .host
                    .players()
                    .map(|player| {
                        format!(
                            "{}{}{} at {}",
                            player.name,
                            if player.online { "" } else { " (offline)" },
                            if player.operator { " [op]" } else { "" },
                            player.location.describe()
                        )
                    })
                    .collect();
                if lines.is_empty() {
                    self.push_system("Nobody has joined yet");
                }
                for line in lines {
                    self.push_system(line);
                }
                let worlds: Vec<&str> = self.host.worlds().collect();
                let worlds = worlds.join(", ");
                self.push_system(format!("Worlds: {worlds}"));
            }
            ConsoleInput::Help => {
                for (usage, about) in VERB_HELP {
                    self.push_system(format!("{usage} - {about}"));
                }
                self.push_system("Anything else is chat; /team help lists team commands.");
            }
            ConsoleInput::Quit => self.should_quit = true,
        }
        self.collect_deliveries();
        Ok(())
    }

    fn route_chat(&mut self, event: ChatEvent) {
        let name = self.host.display_name(event.sender);
        let message = event.message.clone();
        let route = self.service.handle_chat(&mut self.host, event);
        debug!(player = %name, ?route, "Routed chat line");
        match route {
            ChatRoute::Public => self.push_line(LogKind::Public, None, format!("<{name}> {message}")),
            ChatRoute::Team => {}
            ChatRoute::Consumed => self.push_system(format!("{name} issued: {message}")),
        }
        self.collect_deliveries();
    }

    fn collect_deliveries(&mut self) {
        for delivery in self.host.take_messages() {
            let to = self.host.display_name(delivery.to);
            self.push_line(LogKind::Delivery, Some(to), delivery.message);
        }
    }

    fn require_active(&self) -> Result<ParticipantId> {
        self.active
            .ok_or_else(|| anyhow!("no active player, use :login <name>"))
    }

    fn find_player(&self, name: &str) -> Result<ParticipantId> {
        self.host
            .find_player(name)
            .ok_or_else(|| anyhow!("unknown player '{name}'"))
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn push_system(&mut self, message: impl Into<String>) {
        self.push_line(LogKind::System, None, message.into());
    }

    fn push_error(&mut self, message: String) {
        error!("{message}");
        self.push_line(LogKind::Error, None, message);
    }

    fn push_line(&mut self, kind: LogKind, to: Option<String>, message: String) {
        self.log.push_back(LogLine {
            stamp: Local::now().format("%H:%M:%S").to_string(),
            kind,
            to,
            message,
        });
        while self.log.len() > LOG_CAPACITY {
            self.log.pop_front();
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(frame.size());
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(rows[0]);

        self.render_log(frame, body[0]);
        self.render_sidebar(frame, body[1]);
        self.render_input(frame, rows[1]);
        self.render_status(frame, rows[2]);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Server");
        let visible = area.height.saturating_sub(2) as usize;
        let skip = self.log.len().saturating_sub(visible);
        let lines: Vec<Line> = self
            .log
            .iter()
            .skip(skip)
            .map(|line| self.log_line(line))
            .collect();
        let paragraph = Paragraph::new(lines).block(block);
        frame.render_widget(paragraph, area);
    }

    fn log_line(&self, line: &LogLine) -> Line<'static> {
        let mut spans = vec![Span::styled(
            format!("{} ", line.stamp),
            Style::default().fg(self.theme.muted),
        )];
        match line.kind {
            LogKind::Delivery => {
                if let Some(to) = &line.to {
                    spans.push(Span::styled(
                        format!("→{to} "),
                        Style::default().fg(self.theme.accent),
                    ));
                }
                spans.extend(self.colored_spans(&line.message, self.theme.text));
            }
            LogKind::Public => {
                spans.push(Span::styled(
                    line.message.clone(),
                    Style::default().fg(self.theme.text),
                ));
            }
            LogKind::System => {
                spans.push(Span::styled(
                    line.message.clone(),
                    Style::default()
                        .fg(self.theme.muted)
                        .add_modifier(Modifier::ITALIC),
                ));
            }
            LogKind::Error => {
                spans.push(Span::styled(
                    line.message.clone(),
                    Style::default().fg(self.theme.danger),
                ));
            }
        }
        Line::from(spans)
    }

    fn colored_spans(&self, message: &str, fallback: Color) -> Vec<Span<'static>> {
        text::segments(message)
            .into_iter()
            .map(|segment| {
                let color = segment.rgb.map(rgb_color).unwrap_or(fallback);
                Span::styled(segment.text, Style::default().fg(color))
            })
            .collect()
    }

    fn render_sidebar(&self, frame: &mut Frame, area: Rect) {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let version = self.host.server_version();
        let mut team_lines: Vec<Line> = Vec::new();
        for team in self.service.registry().all_teams() {
            let mut spans = self.colored_spans(
                &format!("{}{}", text::team_code(team.color(), version), team.name()),
                self.theme.text,
            );
            spans.push(Span::styled(
                format!(
                    " {}/{} lvl {}{}",
                    team.member_count(),
                    team.max_members(),
                    team.level(),
                    if team.pvp_enabled() { " pvp" } else { "" }
                ),
                Style::default().fg(self.theme.muted),
            ));
            team_lines.push(Line::from(spans));
        }
        if team_lines.is_empty() {
            team_lines.push(Line::from(Span::styled(
                "No teams yet",
                Style::default().fg(self.theme.muted),
            )));
        }
        let teams = Paragraph::new(team_lines)
            .block(Block::default().borders(Borders::ALL).title("Teams"))
            .wrap(Wrap { trim: true });
        frame.render_widget(teams, sections[0]);

        let player_lines: Vec<Line> = self
            .host
            .players()
            .map(|player| {
                let marker = if Some(player.id) == self.active { "> " } else { "  " };
                let color = if player.online {
                    self.theme.success
                } else {
                    self.theme.muted
                };
                let team = self
                    .service
                    .registry()
                    .player_team(player.id)
                    .map(|team| format!(" [{}]", team.name()))
                    .unwrap_or_default();
                Line::from(Span::styled(
                    format!("{marker}{}{team}", player.name),
                    Style::default().fg(color),
                ))
            })
            .collect();
        let players = Paragraph::new(player_lines)
            .block(Block::default().borders(Borders::ALL).title("Players"));
        frame.render_widget(players, sections[1]);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect) {
        let prompt = match self.active {
            Some(id) => format!("{}> ", self.host.display_name(id)),
            None => "console> ".to_string(),
        };
        let prompt_width = prompt.len() as u16;
        let line = Line::from(vec![
            Span::styled(prompt, Style::default().fg(self.theme.accent)),
            Span::raw(self.input.buffer.clone()),
        ]);
        let paragraph =
            Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Input"));
        frame.render_widget(paragraph, area);

        let cursor_x = area.x + 1 + prompt_width + self.input.cursor as u16;
        let cursor_x = cursor_x.min(area.x + area.width.saturating_sub(2));
        frame.set_cursor(cursor_x, area.y + 1);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let mut primary = self.status.clone();
        if let Some(id) = self.active {
            if self.service.chat_modes().in_team_chat(id) {
                primary.push_str(" • team chat on");
            }
            if self.service.chat_modes().is_creating(id) {
                primary.push_str(" • naming a new team");
            }
            if self.service.disband_pending(id) {
                primary.push_str(" • disband awaiting /team confirm");
            }
        }
        let paragraph = Paragraph::new(Line::from(primary))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn rgb_color(rgb: u32) -> Color {
    Color::Rgb(
        ((rgb >> 16) & 0xFF) as u8,
        ((rgb >> 8) & 0xFF) as u8,
        (rgb & 0xFF) as u8,
    )
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
