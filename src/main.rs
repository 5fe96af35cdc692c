use anyhow::{ensure, Result};
use chrono::{DateTime, TimeZone, Utc};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, ClearType, DisableLineWrap, EnableLineWrap, EndSynchronizedUpdate,
        EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    f64::consts::TAU,
    io::{self, Stdout, Write},
    time::{Duration, Instant},
};

const FPS_CAP: u64 = 30;
const CELL_ASPECT: f32 = 0.55;

const AU_KM: f64 = 1.495_978_707e8;
const MU_SUN_KM3_S2: f64 = 1.327_124_400_18e11;
const SECONDS_PER_DAY: f64 = 86_400.0;
const AU_SCENE_SCALE: f64 = 2.0;

const KEPLER_TOL: f64 = 1e-8;
const KEPLER_MAX_ITER: u32 = 100;

const ELLIPSE_SAMPLES: usize = 128;
const HYPERBOLA_SAMPLES: usize = 201;
const ASYMPTOTE_FRACTION: f64 = 0.95;
const PATH_MAX_AU: f64 = 20.0;

// -------------------- Shared math --------------------
#[derive(Clone, Copy, Debug, PartialEq)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3 {
    const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    fn new(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3 { x, y, z }
    }
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
    fn scale(self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }
    fn len(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
    fn normalized(self) -> Vec3 {
        let l = self.len().max(1e-12);
        self.scale(1.0 / l)
    }
    fn cross(self, o: Vec3) -> Vec3 {
        Vec3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }
}

fn clamp_f32(x: f32, a: f32, b: f32) -> f32 {
    x.max(a).min(b)
}
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// -------------------- Kepler solvers --------------------
// Newton-Raphson with a fixed step tolerance and a hard iteration cap.
// The cap is fail-soft: the best available anomaly is returned either way,
// and the final residual rides along so callers can see convergence quality.
#[derive(Clone, Copy, Debug)]
struct KeplerSolution {
    anomaly: f64,
    residual: f64,
    iterations: u32,
}

fn solve_kepler(mean_anomaly: f64, e: f64) -> KeplerSolution {
    let m = mean_anomaly.rem_euclid(TAU);
    let mut ecc = m;
    let mut iterations = 0;
    for _ in 0..KEPLER_MAX_ITER {
        let f = ecc - e * ecc.sin() - m;
        let fp = 1.0 - e * ecc.cos();
        let step = f / fp;
        ecc -= step;
        iterations += 1;
        if step.abs() < KEPLER_TOL {
            break;
        }
    }
    KeplerSolution {
        anomaly: ecc,
        residual: ecc - e * ecc.sin() - m,
        iterations,
    }
}

fn solve_kepler_hyperbolic(mean_anomaly: f64, e: f64) -> KeplerSolution {
    let mut hyp = mean_anomaly;
    let mut iterations = 0;
    for _ in 0..KEPLER_MAX_ITER {
        let f = e * hyp.sinh() - hyp - mean_anomaly;
        let fp = e * hyp.cosh() - 1.0;
        let step = f / fp;
        hyp -= step;
        iterations += 1;
        if step.abs() < KEPLER_TOL {
            break;
        }
    }
    KeplerSolution {
        anomaly: hyp,
        residual: e * hyp.sinh() - hyp - mean_anomaly,
        iterations,
    }
}

// -------------------- True anomaly --------------------
fn true_anomaly_elliptic(ecc_anomaly: f64, e: f64) -> f64 {
    let half = ecc_anomaly * 0.5;
    2.0 * ((1.0 + e).sqrt() * half.sin()).atan2((1.0 - e).sqrt() * half.cos())
}

fn true_anomaly_hyperbolic(hyp_anomaly: f64, e: f64) -> f64 {
    let half = hyp_anomaly * 0.5;
    2.0 * ((e + 1.0).sqrt() * half.sinh()).atan2((e - 1.0).sqrt() * half.cosh())
}

// -------------------- Orbit geometry --------------------
// Conic regime is a tagged choice, never inferred from the sign of a.
// Both variants keep a > 0; the parabolic boundary e = 1 is rejected outright.
#[derive(Clone, Copy, Debug)]
enum Orbit {
    Elliptical { a_au: f64, e: f64 },
    Hyperbolic { a_au: f64, e: f64 },
}

impl Orbit {
    fn elliptical(a_au: f64, e: f64) -> Result<Orbit> {
        ensure!(a_au > 0.0, "semi-major axis must be positive, got {a_au}");
        ensure!((0.0..1.0).contains(&e), "elliptical orbit needs 0 <= e < 1, got {e}");
        Ok(Orbit::Elliptical { a_au, e })
    }

    fn hyperbolic(a_au: f64, e: f64) -> Result<Orbit> {
        ensure!(a_au > 0.0, "semi-major axis must be positive, got {a_au}");
        ensure!(e > 1.0, "hyperbolic orbit needs e > 1, got {e}");
        Ok(Orbit::Hyperbolic { a_au, e })
    }

    fn eccentricity(self) -> f64 {
        match self {
            Orbit::Elliptical { e, .. } | Orbit::Hyperbolic { e, .. } => e,
        }
    }

    fn semi_major_axis_au(self) -> f64 {
        match self {
            Orbit::Elliptical { a_au, .. } | Orbit::Hyperbolic { a_au, .. } => a_au,
        }
    }

    fn radius_au(self, true_anomaly: f64) -> f64 {
        match self {
            Orbit::Elliptical { a_au, e } => a_au * (1.0 - e * e) / (1.0 + e * true_anomaly.cos()),
            Orbit::Hyperbolic { a_au, e } => a_au * (e * e - 1.0) / (1.0 + e * true_anomaly.cos()),
        }
    }

    // true anomaly of the outgoing asymptote; elliptical orbits are unbounded in nu
    fn asymptote_limit(self) -> Option<f64> {
        match self {
            Orbit::Elliptical { .. } => None,
            Orbit::Hyperbolic { e, .. } => Some((-1.0 / e).acos()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Orientation {
    omega_deg: f64,
    node_deg: f64,
    incl_deg: f64,
}

impl Orientation {
    const FLAT: Orientation = Orientation { omega_deg: 0.0, node_deg: 0.0, incl_deg: 0.0 };

    fn tilted(incl_deg: f64) -> Orientation {
        Orientation { omega_deg: 0.0, node_deg: 0.0, incl_deg }
    }
}

// Orbital plane -> heliocentric scene coordinates. Perihelion argument and
// inclination fold into the matrix first, the ascending-node rotation last.
// Scene axes: Y is up (the orbital out-of-plane axis), Z takes orbital Y.
// Output is in scene units (AU_SCENE_SCALE units per AU). Pure function.
fn heliocentric(orbit: Orbit, true_anomaly: f64, orient: Orientation) -> Vec3 {
    let r = orbit.radius_au(true_anomaly);
    let x_op = r * true_anomaly.cos();
    let y_op = r * true_anomaly.sin();

    let (sin_w, cos_w) = orient.omega_deg.to_radians().sin_cos();
    let (sin_n, cos_n) = orient.node_deg.to_radians().sin_cos();
    let (sin_i, cos_i) = orient.incl_deg.to_radians().sin_cos();

    let x = (cos_n * cos_w - sin_n * sin_w * cos_i) * x_op
        + (-cos_n * sin_w - sin_n * cos_w * cos_i) * y_op;
    let y = (sin_n * cos_w + cos_n * sin_w * cos_i) * x_op
        + (-sin_n * sin_w + cos_n * cos_w * cos_i) * y_op;
    let z = (sin_w * sin_i) * x_op + (cos_w * sin_i) * y_op;

    Vec3::new(x, z, y).scale(AU_SCENE_SCALE)
}

// -------------------- Bodies --------------------
struct Planet {
    name: &'static str,
    color: Color,
    orbit: Orbit,
    incl_deg: f64,
    period_days: f64,
}

// Display orbits only: mean anomaly zero at day 0, perihelion argument and
// ascending node dropped, inclination kept. The comet gets the full treatment.
fn planet_position(p: &Planet, sim_days: f64) -> Vec3 {
    let n = TAU / p.period_days;
    let m = (n * sim_days).rem_euclid(TAU);
    let e = p.orbit.eccentricity();
    let sol = solve_kepler(m, e);
    let nu = true_anomaly_elliptic(sol.anomaly, e);
    heliocentric(p.orbit, nu, Orientation::tilted(p.incl_deg))
}

fn default_planets() -> Result<Vec<Planet>> {
    Ok(vec![
        Planet {
            name: "Mercury",
            color: Color::Grey,
            orbit: Orbit::elliptical(0.387, 0.2056)?,
            incl_deg: 7.00,
            period_days: 87.969,
        },
        Planet {
            name: "Venus",
            color: Color::Yellow,
            orbit: Orbit::elliptical(0.723, 0.0068)?,
            incl_deg: 3.39,
            period_days: 224.701,
        },
        Planet {
            name: "Earth",
            color: Color::Cyan,
            orbit: Orbit::elliptical(1.000, 0.017)?,
            incl_deg: 0.00,
            period_days: 365.25,
        },
        Planet {
            name: "Mars",
            color: Color::Red,
            orbit: Orbit::elliptical(1.524, 0.0934)?,
            incl_deg: 1.85,
            period_days: 686.980,
        },
        Planet {
            name: "Jupiter",
            color: Color::Rgb { r: 255, g: 200, b: 160 },
            orbit: Orbit::elliptical(5.203, 0.0484)?,
            incl_deg: 1.30,
            period_days: 4332.589,
        },
    ])
}

struct Comet {
    name: &'static str,
    orbit: Orbit,
    orientation: Orientation,
    perihelion: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
struct CometState {
    position: Vec3,
    r_au: f64,
    speed_kms: f64,
    residual: f64,
    iterations: u32,
}

fn atlas_comet() -> Result<Comet> {
    Ok(Comet {
        name: "3I/ATLAS",
        // q = a(e-1) = 1.35 AU, e = 6.14; retrograde, nearly in the ecliptic
        orbit: Orbit::hyperbolic(0.26265, 6.14)?,
        orientation: Orientation { omega_deg: 128.01, node_deg: 322.16, incl_deg: 175.11 },
        perihelion: Utc.with_ymd_and_hms(2025, 10, 29, 12, 0, 0).unwrap(),
    })
}

fn mission_epoch() -> DateTime<Utc> {
    // discovery day of 3I/ATLAS; simulated day 0
    Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0)
}

// Hyperbolic mean motion from mu and a in km units, then mean anomaly grows
// linearly with time since perihelion. Negative before the flyby.
fn comet_state(c: &Comet, sim_days: f64) -> CometState {
    let peri_offset = days_between(mission_epoch(), c.perihelion);
    let days_since_perihelion = sim_days - peri_offset;

    let a_km = c.orbit.semi_major_axis_au() * AU_KM;
    let n = (MU_SUN_KM3_S2 / (a_km * a_km * a_km)).sqrt();
    let m = n * days_since_perihelion * SECONDS_PER_DAY;

    let e = c.orbit.eccentricity();
    let sol = solve_kepler_hyperbolic(m, e);
    let nu = true_anomaly_hyperbolic(sol.anomaly, e);
    let position = heliocentric(c.orbit, nu, c.orientation);

    let r_au = position.len() / AU_SCENE_SCALE;
    let r_km = r_au * AU_KM;
    let speed_kms = (MU_SUN_KM3_S2 * (2.0 / r_km + 1.0 / a_km)).sqrt();

    CometState {
        position,
        r_au,
        speed_kms,
        residual: sol.residual,
        iterations: sol.iterations,
    }
}

// -------------------- Orbit path sampling --------------------
// Static polylines, computed once per element set, never per frame.
fn sample_ellipse_path(orbit: Orbit) -> Vec<Vec3> {
    let mut path = Vec::with_capacity(ELLIPSE_SAMPLES);
    for i in 0..ELLIPSE_SAMPLES {
        let nu = TAU * (i as f64 / ELLIPSE_SAMPLES as f64);
        path.push(heliocentric(orbit, nu, Orientation::FLAT));
    }
    path
}

fn sample_hyperbola_path(orbit: Orbit, orient: Orientation) -> Vec<Vec3> {
    let Some(limit) = orbit.asymptote_limit() else {
        return Vec::new();
    };
    let nu_max = limit * ASYMPTOTE_FRACTION;
    let mut path = Vec::with_capacity(HYPERBOLA_SAMPLES);
    for i in 0..HYPERBOLA_SAMPLES {
        let t = i as f64 / (HYPERBOLA_SAMPLES - 1) as f64;
        let nu = -nu_max + 2.0 * nu_max * t;
        let r = orbit.radius_au(nu);
        // near the asymptote the radius blows up; keep a sane display window
        if r <= 0.0 || r >= PATH_MAX_AU {
            continue;
        }
        path.push(heliocentric(orbit, nu, orient));
    }
    path
}

// -------------------- Simulation clock --------------------
// Single owner of simulated time. Every body position is a pure function of
// sim_days, so scrubbing anywhere is exact and never desyncs.
struct SimClock {
    sim_days: f64,
    playing: bool,
    speed: f64, // simulated days per real second
}

impl SimClock {
    fn new(start_days: f64) -> SimClock {
        SimClock { sim_days: start_days, playing: true, speed: 2.0 }
    }

    fn tick(&mut self, real_dt_secs: f64) {
        if self.playing {
            self.sim_days += self.speed * real_dt_secs;
        }
    }

    fn toggle_playing(&mut self) {
        self.playing = !self.playing;
    }

    fn scale_speed(&mut self, factor: f64) {
        self.speed *= factor;
    }

    fn scrub_to(&mut self, days: f64) {
        self.sim_days = days;
    }

    fn scrub_by(&mut self, days: f64) {
        self.sim_days += days;
    }

    fn jump_to_event(&mut self, ev: &MissionEvent) {
        self.sim_days = ev.days_from_start;
    }

    fn jump_to_now(&mut self) {
        self.sim_days = days_between(mission_epoch(), Utc::now());
    }

    fn current_date(&self) -> Option<DateTime<Utc>> {
        let ms = self.sim_days * SECONDS_PER_DAY * 1000.0;
        mission_epoch().checked_add_signed(chrono::Duration::milliseconds(ms as i64))
    }
}

// -------------------- Mission events --------------------
// Reference data for the HUD and for clock jumps; no physics reads this.
struct MissionEvent {
    name: &'static str,
    date: DateTime<Utc>,
    days_from_start: f64,
    description: &'static str,
}

fn mission_events() -> Vec<MissionEvent> {
    let epoch = mission_epoch();
    let ev = |name, (y, mo, d, h): (i32, u32, u32, u32), description| {
        let date = Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap();
        MissionEvent { name, date, days_from_start: days_between(epoch, date), description }
    };
    vec![
        ev(
            "Discovery",
            (2025, 7, 1, 0),
            "Spotted by the ATLAS survey telescope in Rio Hurtado, Chile. Third interstellar object on record.",
        ),
        ev(
            "Mars flyby",
            (2025, 10, 3, 0),
            "Passes about 0.19 AU from Mars and is imaged by the orbiters there.",
        ),
        ev(
            "Perihelion",
            (2025, 10, 29, 12),
            "Closest to the Sun at 1.35 AU, just inside the orbit of Mars, moving near 68 km/s.",
        ),
        ev(
            "Earth approach",
            (2025, 12, 19, 0),
            "Nearest to Earth at roughly 1.8 AU. No threat, but prime viewing for large telescopes.",
        ),
        ev(
            "Jupiter distance",
            (2026, 3, 16, 0),
            "Crosses Jupiter's distance outbound, headed back to interstellar space for good.",
        ),
    ]
}

// -------------------- Camera --------------------
#[derive(Clone, Copy, PartialEq, Eq)]
enum CameraView {
    Top,
    Tilted,
    Side,
}

impl CameraView {
    fn next(self) -> CameraView {
        match self {
            CameraView::Top => CameraView::Tilted,
            CameraView::Tilted => CameraView::Side,
            CameraView::Side => CameraView::Top,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CameraView::Top => "top",
            CameraView::Tilted => "tilted",
            CameraView::Side => "side",
        }
    }
}

struct Camera {
    view: CameraView,
    zoom: f32,
    follow_comet: bool,
    show_paths: bool,
    show_labels: bool,
    show_trail: bool,
}

impl Camera {
    fn new() -> Camera {
        Camera {
            view: CameraView::Top,
            zoom: 1.0,
            follow_comet: false,
            show_paths: true,
            show_labels: true,
            show_trail: true,
        }
    }
}

// scene-space 3D down to a 2D map plane, before pan/zoom
fn project(view: CameraView, p: Vec3) -> (f32, f32) {
    match view {
        CameraView::Top => (p.x as f32, p.z as f32),
        CameraView::Tilted => (p.x as f32, (p.z * 0.45 - p.y * 0.85) as f32),
        CameraView::Side => (p.x as f32, -p.y as f32),
    }
}

// -------------------- Cell screen --------------------
#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BLANK: Cell = Cell { ch: ' ', fg: Color::Reset, bg: Color::Black };
}

struct Screen {
    w: u16,
    h: u16,
    cells: Vec<Cell>,
    front: Vec<Cell>,
}

impl Screen {
    fn new() -> Screen {
        Screen { w: 0, h: 0, cells: Vec::new(), front: Vec::new() }
    }

    fn resize(&mut self, w: u16, h: u16) -> bool {
        if w == self.w && h == self.h {
            return false;
        }
        self.w = w.max(70);
        self.h = h.max(24);
        let n = (self.w as usize) * (self.h as usize);
        self.cells = vec![Cell::BLANK; n];
        self.front = vec![Cell::BLANK; n];
        true
    }

    fn clear(&mut self) {
        for c in self.cells.iter_mut() {
            *c = Cell::BLANK;
        }
    }

    fn put(&mut self, x: i32, y: i32, ch: char, fg: Color) {
        if x < 0 || y < 0 || x >= self.w as i32 || y >= self.h as i32 {
            return;
        }
        self.cells[y as usize * self.w as usize + x as usize] = Cell { ch, fg, bg: Color::Black };
    }

    fn text(&mut self, x: i32, y: i32, s: &str, fg: Color) {
        let mut xi = x;
        for ch in s.chars() {
            self.put(xi, y, ch, fg);
            xi += 1;
        }
    }

    // word wrap into a column; returns rows consumed
    fn text_wrapped(&mut self, x: i32, y: i32, max_w: i32, s: &str, fg: Color) -> i32 {
        if max_w <= 0 {
            return 0;
        }
        let mut line = String::new();
        let mut row = y;
        for word in s.split_whitespace() {
            let need = if line.is_empty() { word.len() } else { line.len() + 1 + word.len() };
            if need as i32 > max_w && !line.is_empty() {
                self.text(x, row, &line, fg);
                row += 1;
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            self.text(x, row, &line, fg);
        }
        row - y + 1
    }

    fn frame(&mut self, x0: i32, y0: i32, bw: i32, bh: i32, fg: Color) {
        if bw < 2 || bh < 2 {
            return;
        }
        let x1 = x0 + bw - 1;
        let y1 = y0 + bh - 1;
        for x in x0 + 1..x1 {
            self.put(x, y0, '─', fg);
            self.put(x, y1, '─', fg);
        }
        for y in y0 + 1..y1 {
            self.put(x0, y, '│', fg);
            self.put(x1, y, '│', fg);
        }
        self.put(x0, y0, '┌', fg);
        self.put(x1, y0, '┐', fg);
        self.put(x0, y1, '└', fg);
        self.put(x1, y1, '┘', fg);
    }

    fn present(&mut self, out: &mut Stdout) -> io::Result<()> {
        let mut cur_fg = Color::Reset;
        let mut cur_bg = Color::Reset;
        for y in 0..self.h as usize {
            for x in 0..self.w as usize {
                let i = y * self.w as usize + x;
                if self.front[i] == self.cells[i] {
                    continue;
                }
                self.front[i] = self.cells[i];
                let c = self.cells[i];
                queue!(out, cursor::MoveTo(x as u16, y as u16))?;
                if c.bg != cur_bg {
                    cur_bg = c.bg;
                    queue!(out, SetBackgroundColor(cur_bg))?;
                }
                if c.fg != cur_fg {
                    cur_fg = c.fg;
                    queue!(out, SetForegroundColor(cur_fg))?;
                }
                queue!(out, Print(c.ch))?;
            }
        }
        out.flush()
    }

    fn invalidate(&mut self) {
        for c in self.front.iter_mut() {
            *c = Cell { ch: '\u{0}', fg: Color::Reset, bg: Color::Reset };
        }
    }
}

// -------------------- Starfield --------------------
#[derive(Clone, Copy)]
struct Star {
    x: u16,
    y: u16,
    phase: f32,
    depth: f32,
}

fn build_stars(w: u16, h: u16, seed: u64) -> Vec<Star> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = ((w as usize * h as usize) / 80).clamp(40, 220);
    let mut stars = Vec::with_capacity(count);
    if w == 0 || h == 0 {
        return stars;
    }
    for _ in 0..count {
        stars.push(Star {
            x: rng.gen_range(0..w),
            y: rng.gen_range(0..h),
            phase: rng.gen_range(0.0..std::f32::consts::TAU),
            depth: rng.gen_range(0.3..1.0),
        });
    }
    stars
}

fn draw_stars(scr: &mut Screen, stars: &[Star], main_w: u16, t_real: f32) {
    for s in stars {
        if s.x >= main_w {
            continue;
        }
        let tw = (t_real * 0.6 + s.phase).sin() * 0.5 + 0.5;
        let b = lerp(0.15, 1.0, tw * s.depth);
        let v = clamp_f32(40.0 + b * 160.0, 0.0, 255.0) as u8;
        let ch = if b > 0.8 { '✦' } else if b > 0.55 { '•' } else { '·' };
        scr.put(
            s.x as i32,
            s.y as i32,
            ch,
            Color::Rgb { r: v, g: v, b: (v as u16 + 30).min(255) as u8 },
        );
    }
}

// -------------------- Map rendering --------------------
struct MapFrame {
    cx: f32,
    cy: f32,
    scale: f32,
    center: (f32, f32),
    view: CameraView,
    main_w: i32,
    main_h: i32,
}

impl MapFrame {
    fn to_screen(&self, p: Vec3) -> (i32, i32) {
        let (px, py) = project(self.view, p);
        let sx = self.cx + (px - self.center.0) * self.scale;
        let sy = self.cy + (py - self.center.1) * self.scale * CELL_ASPECT;
        (sx.round() as i32, sy.round() as i32)
    }

    fn on_map(&self, x: i32, y: i32) -> bool {
        x >= 1 && y >= 1 && x < self.main_w - 1 && y < self.main_h - 1
    }
}

fn draw_path(scr: &mut Screen, frame: &MapFrame, path: &[Vec3], fg: Color) {
    for p in path {
        let (x, y) = frame.to_screen(*p);
        if frame.on_map(x, y) {
            scr.put(x, y, '·', fg);
        }
    }
}

fn draw_trail(scr: &mut Screen, frame: &MapFrame, trail: &[Vec3], color: Color) {
    let rgb = match color {
        Color::Rgb { r, g, b } => (r, g, b),
        _ => (180, 180, 180),
    };
    for (i, p) in trail.iter().enumerate() {
        let fade = lerp(0.15, 0.9, i as f32 / trail.len().max(1) as f32);
        let c = Color::Rgb {
            r: (rgb.0 as f32 * fade) as u8,
            g: (rgb.1 as f32 * fade) as u8,
            b: (rgb.2 as f32 * fade) as u8,
        };
        let (x, y) = frame.to_screen(*p);
        if frame.on_map(x, y) {
            scr.put(x, y, '·', c);
        }
    }
}

// Dust fan pointing away from the Sun, fed by the nucleus position and the
// sunward unit vector. Purely decorative; the physics core knows nothing of it.
fn draw_comet_tail(scr: &mut Screen, frame: &MapFrame, nucleus: Vec3, rng: &mut StdRng) {
    let anti_sunward = nucleus.normalized();
    let mut side = anti_sunward.cross(Vec3::new(0.0, 1.0, 0.0));
    if side.len() < 1e-6 {
        side = Vec3::new(1.0, 0.0, 0.0);
    }
    let side = side.normalized();

    let tail_len = 1.6; // scene units
    for _ in 0..42 {
        let frac: f64 = rng.gen_range(0.0f64..1.0).powf(1.4);
        let jitter: f64 = rng.gen_range(-0.22..0.22) * frac;
        let p = nucleus
            .add(anti_sunward.scale(frac * tail_len))
            .add(side.scale(jitter * tail_len));
        let (x, y) = frame.to_screen(p);
        if !frame.on_map(x, y) {
            continue;
        }
        let fade = 1.0 - frac as f32;
        let ch = if fade > 0.7 { '∙' } else { '·' };
        let c = Color::Rgb {
            r: (90.0 + 100.0 * fade) as u8,
            g: (140.0 + 90.0 * fade) as u8,
            b: (190.0 + 65.0 * fade) as u8,
        };
        scr.put(x, y, ch, c);
    }
}

// -------------------- Timeline --------------------
fn draw_timeline(
    scr: &mut Screen,
    main_w: i32,
    h: i32,
    events: &[MissionEvent],
    sim_days: f64,
) {
    let dim = Color::Rgb { r: 110, g: 110, b: 120 };
    let bright = Color::Rgb { r: 230, g: 230, b: 240 };

    let first = events.first().map(|e| e.days_from_start).unwrap_or(0.0);
    let last = events.last().map(|e| e.days_from_start).unwrap_or(365.0);
    let t0 = first - 45.0;
    let t1 = last + 60.0;

    let y = h - 2;
    let x0 = 2;
    let x1 = main_w - 3;
    if x1 - x0 < 10 {
        return;
    }
    let span = (x1 - x0) as f64;
    let to_x = |d: f64| x0 + ((d - t0) / (t1 - t0) * span).round() as i32;

    for x in x0..=x1 {
        scr.put(x, y, '─', dim);
    }
    for (i, ev) in events.iter().enumerate() {
        let x = to_x(ev.days_from_start);
        scr.put(x, y, '┼', Color::Rgb { r: 200, g: 170, b: 90 });
        scr.put(x, y - 1, char::from_digit(i as u32 + 1, 10).unwrap_or('?'), dim);
    }
    let cursor_x = to_x(sim_days.clamp(t0, t1)).clamp(x0, x1);
    scr.put(cursor_x, y, '◆', bright);
    scr.text(x0, y + 1, &format!("day {:+.1}", sim_days), dim);
}

// -------------------- HUD --------------------
fn draw_hud(
    scr: &mut Screen,
    main_w: i32,
    hud_w: i32,
    h: i32,
    clock: &SimClock,
    cam: &Camera,
    comet: &CometState,
    events: &[MissionEvent],
) {
    let edge = Color::Rgb { r: 80, g: 95, b: 120 };
    let fg = Color::Rgb { r: 220, g: 220, b: 230 };
    let dim = Color::Rgb { r: 130, g: 140, b: 155 };
    let accent = Color::Rgb { r: 120, g: 200, b: 255 };

    for y in 0..h {
        scr.put(main_w, y, '│', edge);
    }

    let top_h = 9.min(h - 10).max(6);
    scr.frame(main_w, 0, hud_w, top_h, edge);
    scr.frame(main_w, top_h, hud_w, h - top_h, edge);

    let x = main_w + 2;
    let wrap_w = hud_w - 4;

    let mut ty = 1;
    scr.text(x, ty, "3I/ATLAS orrery", fg);
    ty += 1;
    let date = clock
        .current_date()
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "out of calendar range".into());
    scr.text(x, ty, &format!("Date: {}", date), dim);
    ty += 1;
    scr.text(x, ty, &format!("Day:  {:+.2}", clock.sim_days), dim);
    ty += 1;
    scr.text(x, ty, &format!("Warp: {:.2} d/s", clock.speed), dim);
    ty += 1;
    scr.text(
        x,
        ty,
        &format!("State: {}", if clock.playing { "running" } else { "paused" }),
        dim,
    );
    ty += 1;
    scr.text(
        x,
        ty,
        &format!(
            "View: {}  zoom {:.2}x  {}",
            cam.view.label(),
            cam.zoom,
            if cam.follow_comet { "follow comet" } else { "follow sun" }
        ),
        dim,
    );

    let mut by = top_h + 1;
    scr.text(x, by, "Comet", fg);
    by += 1;
    scr.text(x, by, &format!("r: {:.3} AU", comet.r_au), accent);
    by += 1;
    scr.text(x, by, &format!("v: {:.1} km/s", comet.speed_kms), accent);
    by += 1;
    scr.text(
        x,
        by,
        &format!("NR: {:.1e} ({} it)", comet.residual, comet.iterations),
        if comet.residual.abs() < 1e-6 { dim } else { Color::Red },
    );
    by += 2;

    // show the event we are currently near, if any
    let near = events
        .iter()
        .find(|ev| (clock.sim_days - ev.days_from_start).abs() < 5.0);
    if let Some(ev) = near {
        if by < h - 2 {
            scr.text(x, by, &format!("Near: {}", ev.name), fg);
            by += 1;
            by += scr.text_wrapped(x, by, wrap_w, ev.description, dim);
            by += 1;
        }
    }

    if by < h - 2 {
        scr.text(x, by, "Events", fg);
        by += 1;
    }
    for (i, ev) in events.iter().enumerate() {
        if by >= h - 2 {
            break;
        }
        scr.text(
            x,
            by,
            &format!("{} {}  {}", i + 1, ev.date.format("%b %d"), ev.name),
            dim,
        );
        by += 1;
    }

    by += 1;
    if by < h - 2 {
        scr.text(x, by, "Controls", fg);
        by += 1;
    }
    for line in [
        "Space pause | +/- [/] warp",
        "←/→ scrub 1d | ,/. scrub 10d",
        "1-5 events | N now | 0 epoch",
        "V view | W/S zoom | F follow",
        "O paths | L labels | T trail",
        "Q quit",
    ] {
        if by >= h - 1 {
            break;
        }
        by += scr.text_wrapped(x, by, wrap_w, line, dim);
    }
}

// -------------------- Main --------------------
fn main() -> Result<()> {
    let mut out = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, cursor::Hide, DisableLineWrap)?;
    let res = run(&mut out);
    execute!(out, EndSynchronizedUpdate, ResetColor, cursor::Show, EnableLineWrap, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    res
}

fn run(out: &mut Stdout) -> Result<()> {
    let planets = default_planets()?;
    let comet = atlas_comet()?;
    let events = mission_events();

    // static display geometry, one polyline per element set
    let planet_paths: Vec<Vec<Vec3>> =
        planets.iter().map(|p| sample_ellipse_path(p.orbit)).collect();
    let comet_path = sample_hyperbola_path(comet.orbit, comet.orientation);

    let mut clock = SimClock::new(0.0);
    clock.jump_to_now();
    let mut cam = Camera::new();

    let mut scr = Screen::new();
    let mut stars: Vec<Star> = Vec::new();
    let mut rng = StdRng::seed_from_u64(0x31A7_1A5B_EEF);

    let mut trail: Vec<Vec3> = Vec::new();
    let trail_cap = 200;

    let mut last_frame = Instant::now();
    let start = Instant::now();
    let frame_dt = Duration::from_millis(1000 / FPS_CAP);

    loop {
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(k) = event::read()? {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match k.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                    KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Char('P') => {
                        clock.toggle_playing();
                    }

                    KeyCode::Char('+') | KeyCode::Char('=') => clock.scale_speed(2.0),
                    KeyCode::Char('-') => clock.scale_speed(0.5),
                    KeyCode::Char(']') => clock.scale_speed(1.25),
                    KeyCode::Char('[') => clock.scale_speed(0.8),

                    // scrubbing works the same whether running or paused
                    KeyCode::Left => {
                        clock.scrub_by(-1.0);
                        trail.clear();
                    }
                    KeyCode::Right => {
                        clock.scrub_by(1.0);
                        trail.clear();
                    }
                    KeyCode::Char(',') => {
                        clock.scrub_by(-10.0);
                        trail.clear();
                    }
                    KeyCode::Char('.') => {
                        clock.scrub_by(10.0);
                        trail.clear();
                    }

                    KeyCode::Char('n') | KeyCode::Char('N') => {
                        clock.jump_to_now();
                        trail.clear();
                    }
                    KeyCode::Char('0') => {
                        clock.scrub_to(0.0);
                        trail.clear();
                    }
                    KeyCode::Char(c @ '1'..='5') => {
                        let i = c as usize - '1' as usize;
                        if let Some(ev) = events.get(i) {
                            clock.jump_to_event(ev);
                            trail.clear();
                        }
                    }

                    KeyCode::Char('v') | KeyCode::Char('V') => cam.view = cam.view.next(),
                    KeyCode::Char('w') | KeyCode::Char('W') => {
                        cam.zoom = (cam.zoom * 1.12).min(12.0);
                    }
                    KeyCode::Char('s') | KeyCode::Char('S') => {
                        cam.zoom = (cam.zoom / 1.12).max(0.2);
                    }
                    KeyCode::Char('f') | KeyCode::Char('F') => {
                        cam.follow_comet = !cam.follow_comet;
                    }
                    KeyCode::Char('o') | KeyCode::Char('O') => cam.show_paths = !cam.show_paths,
                    KeyCode::Char('l') | KeyCode::Char('L') => cam.show_labels = !cam.show_labels,
                    KeyCode::Char('t') | KeyCode::Char('T') => cam.show_trail = !cam.show_trail,
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        cam.zoom = 1.0;
                        cam.view = CameraView::Top;
                        cam.follow_comet = false;
                    }
                    _ => {}
                }
            }
        }

        let (w, h) = terminal::size()?;
        if scr.resize(w, h) {
            execute!(out, terminal::Clear(ClearType::All))?;
            scr.invalidate();
            let hud_w = 34u16.min(scr.w / 2);
            let main_w = scr.w.saturating_sub(hud_w);
            let seed = 0x0A7_1A5u64 ^ ((scr.w as u64) << 24) ^ (scr.h as u64);
            stars = build_stars(main_w, scr.h, seed);
        }

        let now = Instant::now();
        let dt = (now - last_frame).as_secs_f64().min(0.05);
        last_frame = now;
        clock.tick(dt);

        // one frame: every position recomputed from the clock, nothing carried over
        let planet_pos: Vec<Vec3> =
            planets.iter().map(|p| planet_position(p, clock.sim_days)).collect();
        let comet_now = comet_state(&comet, clock.sim_days);

        if clock.playing {
            trail.push(comet_now.position);
            if trail.len() > trail_cap {
                let overflow = trail.len() - trail_cap;
                trail.drain(0..overflow);
            }
        }

        scr.clear();

        let hud_w = 34i32.min(scr.w as i32 / 2);
        let main_w = scr.w as i32 - hud_w;
        let main_h = scr.h as i32;

        let center = if cam.follow_comet {
            project(cam.view, comet_now.position)
        } else {
            (0.0, 0.0)
        };
        let frame = MapFrame {
            cx: main_w as f32 * 0.5,
            cy: main_h as f32 * 0.5,
            scale: (main_w as f32 / 26.0) * cam.zoom,
            center,
            view: cam.view,
            main_w,
            main_h,
        };

        draw_stars(&mut scr, &stars, main_w as u16, start.elapsed().as_secs_f32());

        if cam.show_paths {
            let path_fg = Color::Rgb { r: 70, g: 85, b: 105 };
            for path in &planet_paths {
                draw_path(&mut scr, &frame, path, path_fg);
            }
            draw_path(&mut scr, &frame, &comet_path, Color::Rgb { r: 90, g: 130, b: 150 });
        }

        if cam.show_trail {
            draw_trail(&mut scr, &frame, &trail, Color::Rgb { r: 140, g: 210, b: 255 });
        }

        draw_comet_tail(&mut scr, &frame, comet_now.position, &mut rng);

        // Sun
        let (sx, sy) = frame.to_screen(Vec3::ZERO);
        if frame.on_map(sx, sy) {
            scr.put(sx, sy, '●', Color::Rgb { r: 255, g: 220, b: 120 });
            if cam.show_labels {
                scr.text(sx + 2, sy, "Sun", Color::Rgb { r: 160, g: 140, b: 90 });
            }
        }

        for (p, pos) in planets.iter().zip(&planet_pos) {
            let (x, y) = frame.to_screen(*pos);
            if frame.on_map(x, y) {
                scr.put(x, y, '●', p.color);
                if cam.show_labels {
                    scr.text(x + 2, y, p.name, Color::Rgb { r: 120, g: 120, b: 130 });
                }
            }
        }

        let (cx, cy) = frame.to_screen(comet_now.position);
        if frame.on_map(cx, cy) {
            scr.put(cx, cy, '◆', Color::Rgb { r: 230, g: 250, b: 255 });
            if cam.show_labels {
                scr.text(cx + 2, cy, comet.name, Color::Rgb { r: 170, g: 220, b: 245 });
            }
        }

        draw_timeline(&mut scr, main_w, main_h, &events, clock.sim_days);
        draw_hud(&mut scr, main_w, hud_w, main_h, &clock, &cam, &comet_now, &events);

        execute!(out, BeginSynchronizedUpdate)?;
        scr.present(out)?;
        execute!(out, EndSynchronizedUpdate)?;

        let elapsed = Instant::now() - now;
        if elapsed < frame_dt {
            std::thread::sleep(frame_dt - elapsed);
        }
    }
}

// -------------------- Tests --------------------
#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn elliptic_solution_reconstructs_mean_anomaly() {
        for ei in 0..100 {
            let e = ei as f64 * 0.01; // 0.00 ..= 0.99
            for mi in 0..16 {
                let m = TAU * mi as f64 / 16.0;
                let sol = solve_kepler(m, e);
                let back = sol.anomaly - e * sol.anomaly.sin();
                assert!(
                    (back - m).abs() < TOL,
                    "e={e} m={m}: got back {back}, residual {}",
                    sol.residual
                );
            }
        }
    }

    #[test]
    fn elliptic_solver_reduces_mean_anomaly() {
        let e = 0.3;
        let a = solve_kepler(1.0, e);
        let b = solve_kepler(1.0 + 3.0 * TAU, e);
        let c = solve_kepler(1.0 - 2.0 * TAU, e);
        assert!((a.anomaly - b.anomaly).abs() < TOL);
        assert!((a.anomaly - c.anomaly).abs() < TOL);
    }

    #[test]
    fn hyperbolic_solution_reconstructs_mean_anomaly() {
        for e in [1.05, 1.5, 2.0, 3.3, 6.14, 10.0] {
            for mi in -8..=8 {
                let m = mi as f64 * 5.0; // -40 ..= 40
                let sol = solve_kepler_hyperbolic(m, e);
                let back = e * sol.anomaly.sinh() - sol.anomaly;
                assert!(
                    (back - m).abs() < TOL,
                    "e={e} m={m}: got back {back} after {} iterations",
                    sol.iterations
                );
            }
        }
    }

    #[test]
    fn solver_reports_convergence_quality() {
        let sol = solve_kepler(2.5, 0.5);
        assert!(sol.residual.abs() < 1e-8);
        assert!(sol.iterations < KEPLER_MAX_ITER);

        // near-parabolic inputs converge slowly; the cap must still return a
        // finite anomaly and an honest residual
        let hard = solve_kepler(1e-3, 0.9999);
        assert!(hard.anomaly.is_finite());
        assert!(hard.residual.is_finite());
        assert!(hard.iterations <= KEPLER_MAX_ITER);
    }

    #[test]
    fn true_anomaly_is_odd_in_the_anomaly() {
        for e in [0.0, 0.2, 0.7, 0.95] {
            for i in 1..10 {
                let anom = i as f64 * 0.3;
                let plus = true_anomaly_elliptic(anom, e);
                let minus = true_anomaly_elliptic(-anom, e);
                assert!((plus + minus).abs() < TOL, "e={e} E={anom}");
            }
        }
        for e in [1.2, 2.0, 6.14] {
            for i in 1..10 {
                let anom = i as f64 * 0.4;
                let plus = true_anomaly_hyperbolic(anom, e);
                let minus = true_anomaly_hyperbolic(-anom, e);
                assert!((plus + minus).abs() < TOL, "e={e} H={anom}");
            }
        }
    }

    #[test]
    fn radius_at_perihelion() {
        let ell = Orbit::elliptical(1.524, 0.0934).unwrap();
        assert!((ell.radius_au(0.0) - 1.524 * (1.0 - 0.0934)).abs() < TOL);

        let hyp = Orbit::hyperbolic(0.26265, 6.14).unwrap();
        assert!((hyp.radius_au(0.0) - 0.26265 * (6.14 - 1.0)).abs() < TOL);
    }

    #[test]
    fn parabolic_eccentricity_is_rejected() {
        assert!(Orbit::elliptical(1.0, 1.0).is_err());
        assert!(Orbit::hyperbolic(1.0, 1.0).is_err());
        assert!(Orbit::elliptical(-2.0, 0.5).is_err());
        assert!(Orbit::hyperbolic(1.0, 0.5).is_err());
    }

    #[test]
    fn flat_transform_maps_orbital_plane_to_scene_axes() {
        let orbit = Orbit::elliptical(1.5, 0.3).unwrap();
        for ni in 0..12 {
            let nu = TAU * ni as f64 / 12.0;
            let r = orbit.radius_au(nu);
            let p = heliocentric(orbit, nu, Orientation::FLAT);
            assert!((p.x - AU_SCENE_SCALE * r * nu.cos()).abs() < TOL);
            assert!((p.z - AU_SCENE_SCALE * r * nu.sin()).abs() < TOL);
            assert!(p.y.abs() < TOL, "flat orbit must stay in the map plane");
        }
    }

    #[test]
    fn inclined_orbit_leaves_the_map_plane() {
        let orbit = Orbit::elliptical(1.0, 0.1).unwrap();
        let p = heliocentric(orbit, 1.0, Orientation { omega_deg: 30.0, node_deg: 0.0, incl_deg: 45.0 });
        assert!(p.y.abs() > 0.01);
    }

    #[test]
    fn planet_positions_are_periodic() {
        let planets = default_planets().unwrap();
        for p in &planets {
            for t in [-1000.0, 0.0, 37.5, 4000.0] {
                let a = planet_position(p, t);
                let b = planet_position(p, t + p.period_days);
                assert!((a.x - b.x).abs() < 1e-5, "{} at t={t}", p.name);
                assert!((a.y - b.y).abs() < 1e-5, "{} at t={t}", p.name);
                assert!((a.z - b.z).abs() < 1e-5, "{} at t={t}", p.name);
            }
        }
    }

    #[test]
    fn earth_starts_at_perihelion_distance() {
        let planets = default_planets().unwrap();
        let earth = planets.iter().find(|p| p.name == "Earth").unwrap();
        let r_au = planet_position(earth, 0.0).len() / AU_SCENE_SCALE;
        assert!((r_au - 0.983).abs() < 1e-4, "got {r_au}");
    }

    #[test]
    fn comet_perihelion_distance_is_1_35_au() {
        let comet = atlas_comet().unwrap();
        let peri_day = days_between(mission_epoch(), comet.perihelion);
        let state = comet_state(&comet, peri_day);
        assert!((state.r_au - 1.35).abs() < 1e-3, "got {}", state.r_au);
    }

    #[test]
    fn comet_distance_is_minimized_at_perihelion() {
        let comet = atlas_comet().unwrap();
        let peri_day = days_between(mission_epoch(), comet.perihelion);
        let mut best_day = f64::NAN;
        let mut best_r = f64::INFINITY;
        let mut d = peri_day - 30.0;
        while d <= peri_day + 30.0 {
            let r = comet_state(&comet, d).r_au;
            if r < best_r {
                best_r = r;
                best_day = d;
            }
            d += 0.25;
        }
        assert!((best_day - peri_day).abs() <= 0.25, "minimum at day {best_day}, expected {peri_day}");
    }

    #[test]
    fn comet_speed_matches_vis_viva_at_perihelion() {
        let comet = atlas_comet().unwrap();
        let peri_day = days_between(mission_epoch(), comet.perihelion);
        let v = comet_state(&comet, peri_day).speed_kms;
        // 3I/ATLAS swung past the Sun at roughly 68 km/s
        assert!(v > 60.0 && v < 75.0, "got {v}");
    }

    #[test]
    fn scrubbing_equals_ticking() {
        let planets = default_planets().unwrap();
        let comet = atlas_comet().unwrap();

        let mut ticked = SimClock::new(0.0);
        ticked.speed = 10.0;
        for _ in 0..400 {
            ticked.tick(0.025); // 400 * 0.25 days = 100 days
        }
        assert!((ticked.sim_days - 100.0).abs() < 1e-9);

        let mut scrubbed = SimClock::new(0.0);
        scrubbed.scrub_to(100.0);

        for p in &planets {
            let a = planet_position(p, ticked.sim_days);
            let b = planet_position(p, scrubbed.sim_days);
            assert!((a.x - b.x).abs() < 1e-9, "{}", p.name);
            assert!((a.y - b.y).abs() < 1e-9, "{}", p.name);
            assert!((a.z - b.z).abs() < 1e-9, "{}", p.name);
        }
        let a = comet_state(&comet, ticked.sim_days).position;
        let b = comet_state(&comet, scrubbed.sim_days).position;
        assert!((a.x - b.x).abs() < 1e-9);
        assert!((a.y - b.y).abs() < 1e-9);
        assert!((a.z - b.z).abs() < 1e-9);
    }

    #[test]
    fn clock_holds_while_paused_and_scales_with_speed() {
        let mut clock = SimClock::new(5.0);
        clock.toggle_playing();
        clock.tick(10.0);
        assert_eq!(clock.sim_days, 5.0);

        clock.toggle_playing();
        clock.speed = 4.0;
        clock.tick(0.5);
        assert!((clock.sim_days - 7.0).abs() < 1e-12);

        // scrubbing is an absolute set and works while running
        clock.scrub_to(-300.0);
        assert_eq!(clock.sim_days, -300.0);
    }

    #[test]
    fn event_jumps_land_on_event_days() {
        let events = mission_events();
        let mut clock = SimClock::new(0.0);
        for ev in &events {
            clock.jump_to_event(ev);
            assert_eq!(clock.sim_days, ev.days_from_start);
        }
        let peri = events.iter().find(|e| e.name == "Perihelion").unwrap();
        assert!((peri.days_from_start - 120.5).abs() < 1e-9);
    }

    #[test]
    fn ellipse_path_has_fixed_resolution_and_bounded_radius() {
        let orbit = Orbit::elliptical(1.524, 0.0934).unwrap();
        let path = sample_ellipse_path(orbit);
        assert_eq!(path.len(), ELLIPSE_SAMPLES);
        let (a, e) = (1.524, 0.0934);
        for p in &path {
            let r = p.len() / AU_SCENE_SCALE;
            assert!(r >= a * (1.0 - e) - TOL);
            assert!(r <= a * (1.0 + e) + TOL);
        }
    }

    #[test]
    fn hyperbola_path_respects_display_clamp() {
        let comet = atlas_comet().unwrap();
        let path = sample_hyperbola_path(comet.orbit, comet.orientation);
        // the 95% truncation puts this path's endpoints near 18 AU, inside
        // the display clamp, so every sample survives
        assert_eq!(path.len(), HYPERBOLA_SAMPLES);
        for p in &path {
            let r = p.len() / AU_SCENE_SCALE;
            assert!(r > 0.0 && r < PATH_MAX_AU, "r={r}");
        }

        // a wider hyperbola runs past 20 AU near the asymptote and loses points
        let wide = Orbit::hyperbolic(0.30, 6.14).unwrap();
        let clamped = sample_hyperbola_path(wide, Orientation::FLAT);
        assert!(!clamped.is_empty());
        assert!(clamped.len() < HYPERBOLA_SAMPLES);
        for p in &clamped {
            let r = p.len() / AU_SCENE_SCALE;
            assert!(r > 0.0 && r < PATH_MAX_AU, "r={r}");
        }
    }

    #[test]
    fn ellipse_sampler_ignores_hyperbolic_limit() {
        let orbit = Orbit::elliptical(1.0, 0.5).unwrap();
        assert!(orbit.asymptote_limit().is_none());
        let hyp = Orbit::hyperbolic(1.0, 2.0).unwrap();
        let lim = hyp.asymptote_limit().unwrap();
        assert!((lim - (-0.5f64).acos()).abs() < TOL);
    }
}
