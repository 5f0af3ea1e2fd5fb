use crate::audio::AudioSystem;
use crate::config::{Config, RendererMode};
use crate::prefs::{prefs_storage_path, AppPrefs};
use crate::render::{AsciiRenderer, BrailleRenderer, Frame, HalfBlockRenderer, Renderer};
use crate::terminal::TerminalGuard;
use crate::viz::{
    register_builtins, Deck, Registry, SettingKind, SettingValue,
};
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::fmt::Write as _;
use std::io::BufWriter;
use std::time::{Duration, Instant};

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let _term = TerminalGuard::new()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());

    let mut renderer: Box<dyn Renderer> = match cfg.renderer {
        RendererMode::Ascii => Box::new(AsciiRenderer::new()),
        RendererMode::HalfBlock => Box::new(HalfBlockRenderer::new()),
        RendererMode::Braille => Box::new(BrailleRenderer::new()),
    };
    let (px_w_mul, px_h_mul) = renderer.cell_geometry();

    let audio = AudioSystem::new(cfg.source, cfg.device.as_deref())
        .with_context(|| format!("start audio (source={:?})", cfg.source))?;
    let samples_handle = audio.samples();

    let prefs_path = if cfg.no_prefs {
        None
    } else {
        prefs_storage_path()
    };
    let prefs = AppPrefs::load(prefs_path.as_deref()).unwrap_or_default();

    let mut registry = Registry::new();
    register_builtins(&mut registry);
    let mut deck = Deck::new(registry);

    let start_viz = cfg.viz.clone().or(prefs.visualizer);
    if let Some(want) = start_viz.as_deref() {
        if let Some(id) = select_visualizer(want, deck.registry()) {
            deck.switch_to(id);
        }
    }
    if cfg.mutate || prefs.global_mutation {
        deck.registry_mut().global_mutation = true;
    }
    if cfg.random || prefs.random_mode {
        deck.set_random_mode(true);
    }
    deck.set_playing(true);

    let mut last_size = crossterm::terminal::size().context("get terminal size")?;
    if last_size.1 < 2 || last_size.0 < 4 {
        return Err(anyhow::anyhow!(
            "terminal too small (need at least 4x2, got {}x{})",
            last_size.0,
            last_size.1
        ));
    }

    let mut ui = UiState::new();
    resize_deck(&mut deck, last_size, px_w_mul, px_h_mul, ui.hud_rows());

    let start = Instant::now();
    let mut last_frame = start;
    let mut fps = FpsCounter::new();

    loop {
        let now = Instant::now();

        // Drain input (non-blocking).
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    let old_hud_rows = ui.hud_rows();
                    let quit = if ui.settings_open {
                        handle_settings_key(k.code, k.modifiers, &mut deck, &mut ui)
                    } else {
                        handle_key(k.code, k.modifiers, &mut deck, &mut ui)
                    };
                    if quit {
                        save_prefs(prefs_path.as_deref(), &deck);
                        return Ok(());
                    }
                    if ui.hud_rows() != old_hud_rows {
                        resize_deck(&mut deck, last_size, px_w_mul, px_h_mul, ui.hud_rows());
                    }
                }
                Event::Resize(c, r) => {
                    last_size = (c, r);
                    resize_deck(&mut deck, last_size, px_w_mul, px_h_mul, ui.hud_rows());
                }
                _ => {}
            }
        }

        // Some terminals drop resize events; recheck once per frame.
        let sz = crossterm::terminal::size()?;
        if sz != last_size {
            last_size = sz;
            resize_deck(&mut deck, last_size, px_w_mul, px_h_mul, ui.hud_rows());
        }

        let dt = now.duration_since(last_frame).as_secs_f32().max(1e-6);
        last_frame = now;

        // Sample refresh strictly precedes the frame step, which is what
        // orders banding/smoothing after fresh data inside the plugins.
        let block = samples_handle.load();
        let samples = samples_handle.has_data().then_some(&block);
        deck.advance(dt, samples);

        let (term_cols, term_rows) = last_size;
        let hud = if ui.show_hud {
            build_hud(&deck, renderer.name(), fps.fps())
        } else {
            String::new()
        };
        let settings_text;
        let overlay = if ui.settings_open {
            settings_text = build_settings_overlay(&deck, ui.selected_setting);
            Some(settings_text.as_str())
        } else if ui.show_help {
            Some(HELP_TEXT)
        } else {
            None
        };

        let visual_rows = term_rows.saturating_sub(ui.hud_rows()).max(1);
        let frame = Frame {
            term_cols,
            term_rows,
            visual_rows,
            pixel_width: (term_cols as usize) * px_w_mul,
            pixel_height: (visual_rows as usize) * px_h_mul,
            pixels_rgba: deck.canvas().pixels(),
            hud: &hud,
            hud_rows: ui.hud_rows(),
            overlay,
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;

        fps.tick();

        let target = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);
        let elapsed = now.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

struct UiState {
    show_hud: bool,
    show_help: bool,
    settings_open: bool,
    selected_setting: usize,
}

impl UiState {
    fn new() -> Self {
        Self {
            show_hud: true,
            show_help: false,
            settings_open: false,
            selected_setting: 0,
        }
    }

    fn hud_rows(&self) -> u16 {
        if self.show_hud {
            1
        } else {
            0
        }
    }
}

fn resize_deck(deck: &mut Deck, size: (u16, u16), px_w_mul: usize, px_h_mul: usize, hud_rows: u16) {
    let (cols, rows) = size;
    let visual_rows = rows.saturating_sub(hud_rows).max(1);
    deck.resize(
        (cols as usize).saturating_mul(px_w_mul),
        (visual_rows as usize).saturating_mul(px_h_mul),
    );
}

/// Match a `--viz` query against the catalog: exact id first, then a
/// case-insensitive name fragment.
fn select_visualizer(query: &str, registry: &Registry) -> Option<&'static str> {
    let q = query.trim();
    if q.is_empty() {
        return None;
    }
    if let Some(info) = registry.get(q) {
        return Some(info.id);
    }
    let q_l = q.to_lowercase();
    registry
        .all()
        .iter()
        .find(|e| e.display_name.to_lowercase().contains(&q_l))
        .map(|e| e.id)
}

fn save_prefs(path: Option<&std::path::Path>, deck: &Deck) {
    let prefs = AppPrefs {
        random_mode: deck.random_mode(),
        global_mutation: deck.registry().global_mutation,
        visualizer: deck.current_id().map(str::to_string),
    };
    if let Err(err) = prefs.save(path) {
        eprintln!("failed to save prefs: {err}");
    }
}

fn handle_key(
    code: KeyCode,
    mods: KeyModifiers,
    deck: &mut Deck,
    ui: &mut UiState,
) -> bool {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return true;
    }

    match code {
        KeyCode::Esc => {
            if ui.show_help {
                ui.show_help = false;
                false
            } else {
                true
            }
        }
        KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char(' ') => {
            let playing = deck.is_playing();
            deck.set_playing(!playing);
            false
        }
        KeyCode::Right | KeyCode::Char('n') | KeyCode::Char('N') => {
            deck.next_visualizer();
            ui.selected_setting = 0;
            false
        }
        KeyCode::Left | KeyCode::Char('p') | KeyCode::Char('P') => {
            deck.prev_visualizer();
            ui.selected_setting = 0;
            false
        }
        KeyCode::Char('r') | KeyCode::Char('R') => {
            let on = deck.random_mode();
            deck.set_random_mode(!on);
            false
        }
        KeyCode::Char('m') | KeyCode::Char('M') => {
            let on = deck
                .current_setting(crate::viz::MUTATE_MODE)
                .and_then(SettingValue::as_flag)
                .unwrap_or(false);
            deck.set_setting(crate::viz::MUTATE_MODE, SettingValue::Flag(!on));
            false
        }
        KeyCode::Char('g') | KeyCode::Char('G') => {
            let r = deck.registry_mut();
            r.global_mutation = !r.global_mutation;
            false
        }
        KeyCode::Char('t') | KeyCode::Char('T') => {
            deck.mutate_now();
            false
        }
        KeyCode::Char('d') | KeyCode::Char('D') => {
            deck.reset_current_to_defaults();
            false
        }
        KeyCode::Char('s') | KeyCode::Char('S') => {
            ui.settings_open = true;
            ui.show_help = false;
            false
        }
        KeyCode::Char('i') | KeyCode::Char('I') => {
            ui.show_hud = !ui.show_hud;
            false
        }
        KeyCode::Char('?') | KeyCode::Char('/') | KeyCode::Char('h') | KeyCode::F(1) => {
            ui.show_help = !ui.show_help;
            false
        }
        _ => false,
    }
}

fn handle_settings_key(
    code: KeyCode,
    mods: KeyModifiers,
    deck: &mut Deck,
    ui: &mut UiState,
) -> bool {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return true;
    }

    let count = deck
        .current_schema()
        .map(|s| s.settings.len())
        .unwrap_or(0);
    if count == 0 {
        ui.settings_open = false;
        return false;
    }
    ui.selected_setting = ui.selected_setting.min(count - 1);

    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return true,
        KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('S') => {
            ui.settings_open = false;
        }
        KeyCode::Up => {
            ui.selected_setting = ui.selected_setting.saturating_sub(1);
        }
        KeyCode::Down => {
            ui.selected_setting = (ui.selected_setting + 1).min(count - 1);
        }
        KeyCode::Left => adjust_selected(deck, ui.selected_setting, -1),
        KeyCode::Right | KeyCode::Enter => adjust_selected(deck, ui.selected_setting, 1),
        KeyCode::Char('d') | KeyCode::Char('D') => deck.reset_current_to_defaults(),
        KeyCode::Char('t') | KeyCode::Char('T') => {
            deck.mutate_now();
        }
        _ => {}
    }
    false
}

/// The one schema-driven edit path: every control type adjusts through
/// `set_setting`, which clamps and cleans exactly like any other caller.
fn adjust_selected(deck: &mut Deck, index: usize, dir: i32) {
    let Some(schema) = deck.current_schema() else {
        return;
    };
    let Some(spec) = schema.settings.get(index) else {
        return;
    };
    let current = deck.current_setting(spec.key);
    match spec.kind {
        SettingKind::Range { step, .. } => {
            if let Some(SettingValue::Number(v)) = current {
                deck.set_setting(spec.key, SettingValue::Number(v + step * dir as f32));
            }
        }
        SettingKind::Select { options } => {
            if options.is_empty() {
                return;
            }
            if let Some(SettingValue::Choice(v)) = current {
                let pos = options.iter().position(|o| o.value == v).unwrap_or(0);
                let next = (pos as i32 + dir).rem_euclid(options.len() as i32) as usize;
                deck.set_setting(spec.key, SettingValue::Choice(options[next].value));
            }
        }
        SettingKind::Toggle => {
            if let Some(SettingValue::Flag(v)) = current {
                deck.set_setting(spec.key, SettingValue::Flag(!v));
            }
        }
    }
}

fn build_hud(deck: &Deck, renderer_name: &str, fps: f32) -> String {
    let name = deck
        .current_info()
        .map(|i| i.display_name)
        .unwrap_or("<none>");
    let playing = if deck.is_playing() { "playing" } else { "paused" };
    let random = if deck.random_mode() { "on" } else { "off" };
    let global = if deck.registry().global_mutation {
        "on"
    } else {
        "off"
    };
    let mutate = deck
        .current_setting(crate::viz::MUTATE_MODE)
        .and_then(SettingValue::as_flag)
        .map(|v| if v { "on" } else { "off" })
        .unwrap_or("-");

    let mut hud = format!(
        " {name} | {playing} | random:{random} mutate:{mutate} global:{global} | {renderer_name} {fps:.0}fps | ? help"
    );
    if !deck.recent_mutations().is_empty() {
        let keys: Vec<&str> = deck.recent_mutations().iter().map(|m| m.key).collect();
        let _ = write!(hud, " | mutated: {}", keys.join(","));
    }
    hud
}

fn build_settings_overlay(deck: &Deck, selected: usize) -> String {
    let Some(schema) = deck.current_schema() else {
        return String::new();
    };
    let mutated: Vec<&str> = deck.recent_mutations().iter().map(|m| m.key).collect();

    let mut text = format!("{} Settings\n\n", schema.name);
    for (i, spec) in schema.settings.iter().enumerate() {
        let marker = if i == selected { ">" } else { " " };
        let value = deck
            .current_setting(spec.key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let unit = match spec.kind {
            SettingKind::Range { unit, .. } => unit,
            _ => "",
        };
        let flash = if mutated.contains(&spec.key) { " *" } else { "" };
        let _ = writeln!(text, "{marker} {:<18} {}{}{}", spec.label, value, unit, flash);
    }
    text.push_str("\narrows adjust  d defaults  t mutate  s close");
    text
}

const HELP_TEXT: &str = "vizdeck keys\n\n\
space  play / pause\n\
n / p  next / prev visualizer\n\
r      random mode (auto-switch + mutate)\n\
m      mutate mode for this visualizer\n\
g      global mutation override\n\
t      mutate once now\n\
d      reset settings to defaults\n\
s      settings panel\n\
i      HUD on/off\n\
q      quit";

struct FpsCounter {
    frames: u32,
    fps: f32,
    last: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            fps: 0.0,
            last: Instant::now(),
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let elapsed = self.last.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            self.fps = self.frames as f32 / elapsed;
            self.frames = 0;
            self.last = Instant::now();
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
