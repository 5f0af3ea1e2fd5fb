use crate::config::AudioSource;
use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use ringbuf::HeapRb;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Analysis window; half of it is the published spectrum.
pub const FFT_SIZE: usize = 512;
pub const SPECTRUM_BINS: usize = FFT_SIZE / 2;

/// Decibel range mapped onto the 0..255 byte spectrum.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
/// Temporal smoothing applied to magnitudes before byte conversion.
const SMOOTHING: f32 = 0.8;

/// One frame's worth of audio samples, pulled by the shell once per frame and
/// handed read-only to the active visualizer.
///
/// `freq` holds byte frequency magnitudes (0 = at/below -100 dBFS, 255 = at/
/// above -30 dBFS) for bins 0..FFT_SIZE/2; `wave` holds the most recent
/// time-domain samples mapped so that silence sits at 128.
#[derive(Clone, Copy)]
pub struct SampleBlock {
    pub freq: [u8; SPECTRUM_BINS],
    pub wave: [u8; SPECTRUM_BINS],
}

impl Default for SampleBlock {
    fn default() -> Self {
        Self {
            freq: [0; SPECTRUM_BINS],
            wave: [128; SPECTRUM_BINS],
        }
    }
}

impl SampleBlock {
    /// Mean of the given frequency-bin range, normalized to 0..1.
    /// The shared primitive under every plugin's banding.
    pub fn band_average(&self, lo: usize, hi: usize) -> f32 {
        let lo = lo.min(SPECTRUM_BINS);
        let hi = hi.clamp(lo, SPECTRUM_BINS);
        if hi == lo {
            return 0.0;
        }
        let sum: u32 = self.freq[lo..hi].iter().map(|&b| b as u32).sum();
        sum as f32 / ((hi - lo) as f32 * 255.0)
    }

    /// Overall level: mean over the whole spectrum, normalized to 0..1.
    pub fn level(&self) -> f32 {
        self.band_average(0, SPECTRUM_BINS)
    }
}

/// Seqlock-published sample block: the analyzer thread stores, the render
/// loop loads. Bytes are packed four to an `AtomicU32`.
pub struct AtomicSampleBlock {
    seq: AtomicU64,
    freq: [AtomicU32; SPECTRUM_BINS / 4],
    wave: [AtomicU32; SPECTRUM_BINS / 4],
    updated_ms: AtomicU64,
}

impl AtomicSampleBlock {
    pub fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            freq: std::array::from_fn(|_| AtomicU32::new(0)),
            wave: std::array::from_fn(|_| AtomicU32::new(u32::from_le_bytes([128; 4]))),
            updated_ms: AtomicU64::new(0),
        }
    }

    pub fn store(&self, block: &SampleBlock) {
        self.seq.fetch_add(1, Ordering::Release); // odd => write in progress
        for (dst, src) in self.freq.iter().zip(block.freq.chunks_exact(4)) {
            dst.store(
                u32::from_le_bytes([src[0], src[1], src[2], src[3]]),
                Ordering::Relaxed,
            );
        }
        for (dst, src) in self.wave.iter().zip(block.wave.chunks_exact(4)) {
            dst.store(
                u32::from_le_bytes([src[0], src[1], src[2], src[3]]),
                Ordering::Relaxed,
            );
        }
        self.updated_ms.store(now_ms(), Ordering::Relaxed);
        self.seq.fetch_add(1, Ordering::Release); // even => stable
    }

    pub fn load(&self) -> SampleBlock {
        loop {
            let v1 = self.seq.load(Ordering::Acquire);
            if v1 & 1 == 1 {
                continue;
            }

            let mut block = SampleBlock::default();
            for (i, src) in self.freq.iter().enumerate() {
                let bytes = src.load(Ordering::Relaxed).to_le_bytes();
                block.freq[i * 4..i * 4 + 4].copy_from_slice(&bytes);
            }
            for (i, src) in self.wave.iter().enumerate() {
                let bytes = src.load(Ordering::Relaxed).to_le_bytes();
                block.wave[i * 4..i * 4 + 4].copy_from_slice(&bytes);
            }

            let v2 = self.seq.load(Ordering::Acquire);
            if v1 == v2 {
                return block;
            }
        }
    }

    /// True once the analyzer has published at least one block.
    pub fn has_data(&self) -> bool {
        self.updated_ms.load(Ordering::Relaxed) != 0
    }

    pub fn age_ms(&self) -> f32 {
        let t = self.updated_ms.load(Ordering::Relaxed);
        if t == 0 {
            return 0.0;
        }
        now_ms().saturating_sub(t) as f32
    }
}

impl Default for AtomicSampleBlock {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_millis(0))
        .as_millis() as u64
}

pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("enumerate input devices")?;

    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

enum AudioBackend {
    Cpal(cpal::Stream),
    Synth(Option<thread::JoinHandle<()>>),
}

pub struct AudioSystem {
    backend: AudioBackend,
    stop: Arc<AtomicBool>,
    analyzer_handle: Option<thread::JoinHandle<()>>,
    samples: Arc<AtomicSampleBlock>,
    pub sample_rate_hz: u32,
}

impl AudioSystem {
    pub fn new(source: AudioSource, device_query: Option<&str>) -> anyhow::Result<Self> {
        match source {
            AudioSource::Mic => Self::new_mic(device_query),
            AudioSource::Synth => Ok(Self::new_synth()),
        }
    }

    fn new_mic(device_query: Option<&str>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, device_query)?;
        let supported = device
            .default_input_config()
            .context("get default input config")?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let rb_capacity = (sample_rate_hz as usize).saturating_mul(4);
        let rb = HeapRb::<f32>::new(rb_capacity);
        let (mut prod, mut cons) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let samples = Arc::new(AtomicSampleBlock::new());
        let samples_for_thread = Arc::clone(&samples);
        let stop_for_thread = Arc::clone(&stop);

        let err_fn = |err| eprintln!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };

        stream.play().context("start input stream")?;

        let analyzer_handle = thread::spawn(move || {
            analyze_loop(&mut cons, &stop_for_thread, &samples_for_thread)
        });

        Ok(Self {
            backend: AudioBackend::Cpal(stream),
            stop,
            analyzer_handle: Some(analyzer_handle),
            samples,
            sample_rate_hz,
        })
    }

    fn new_synth() -> Self {
        let sample_rate_hz = 48_000u32;

        let rb_capacity = (sample_rate_hz as usize).saturating_mul(4);
        let rb = HeapRb::<f32>::new(rb_capacity);
        let (mut prod, mut cons) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let samples = Arc::new(AtomicSampleBlock::new());
        let samples_for_thread = Arc::clone(&samples);
        let stop_for_analyzer = Arc::clone(&stop);
        let stop_for_synth = Arc::clone(&stop);

        let synth_handle = thread::spawn(move || {
            let chunk = (sample_rate_hz / 100) as usize; // 10 ms
            let dt = 1.0 / sample_rate_hz as f32;
            let mut t = 0.0f32;
            while !stop_for_synth.load(Ordering::Relaxed) {
                for _ in 0..chunk {
                    let _ = prod.try_push(synth_sample(t));
                    t += dt;
                }
                thread::sleep(Duration::from_millis(10));
            }
        });

        let analyzer_handle = thread::spawn(move || {
            analyze_loop(&mut cons, &stop_for_analyzer, &samples_for_thread)
        });

        Self {
            backend: AudioBackend::Synth(Some(synth_handle)),
            stop,
            analyzer_handle: Some(analyzer_handle),
            samples,
            sample_rate_hz,
        }
    }

    pub fn samples(&self) -> Arc<AtomicSampleBlock> {
        Arc::clone(&self.samples)
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.analyzer_handle.take() {
            let _ = h.join();
        }
        match &mut self.backend {
            // The capture stream stays alive for the full AudioSystem
            // lifetime; matching it explicitly keeps that intent visible.
            AudioBackend::Cpal(_stream) => {}
            AudioBackend::Synth(handle) => {
                if let Some(h) = handle.take() {
                    let _ = h.join();
                }
            }
        }
    }
}

/// Deterministic test signal: a kick with an exponential decay every half
/// second, a mid tone that breathes, and a treble shimmer.
fn synth_sample(t: f32) -> f32 {
    let beat_phase = t % 0.5;
    let kick_env = (-beat_phase * 14.0).exp();
    let kick = (2.0 * PI * 55.0 * t).sin() * kick_env * 0.8;
    let mid = (2.0 * PI * 330.0 * t).sin() * 0.22 * (0.5 + 0.5 * (2.0 * PI * 0.37 * t).sin());
    let treb = (2.0 * PI * 2800.0 * t).sin() * 0.10 * (0.5 + 0.5 * (2.0 * PI * 1.3 * t).cos());
    (kick + mid + treb).clamp(-1.0, 1.0)
}

fn select_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> anyhow::Result<cpal::Device> {
    let devices = host
        .input_devices()
        .context("enumerate input devices")?
        .collect::<Vec<_>>();

    let want = device_query.map(|s| s.to_lowercase());
    if let Some(want) = want.as_deref() {
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(anyhow!("no input device matching: {want}"));
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device found"))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    for frame in data.chunks(channels) {
        let mut acc = 0.0f32;
        for s in frame {
            acc += (*s).to_float_sample();
        }
        let mono = acc / channels as f32;
        let _ = prod.try_push(mono);
    }
}

fn analyze_loop(
    cons: &mut ringbuf::HeapCons<f32>,
    stop: &AtomicBool,
    samples: &AtomicSampleBlock,
) {
    let n = FFT_SIZE;
    let hop = n / 2;

    let mut scratch = vec![0.0f32; n];
    let mut write_pos = 0usize;
    let mut filled = 0usize;
    let mut since_last = 0usize;

    let hann = (0..n)
        .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / (n as f32)).cos())
        .collect::<Vec<_>>();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let mut fft_buf = vec![Complex { re: 0.0, im: 0.0 }; n];
    let mut smoothed = vec![0.0f32; SPECTRUM_BINS];
    let mut block = SampleBlock::default();

    while !stop.load(Ordering::Relaxed) {
        let mut got_any = false;
        while let Some(s) = cons.try_pop() {
            got_any = true;
            scratch[write_pos] = s;
            write_pos = (write_pos + 1) % n;
            if filled < n {
                filled += 1;
            }
            since_last += 1;
            if filled == n && since_last >= hop {
                since_last = 0;
                analyze_window(&scratch, write_pos, &hann, &fft, &mut fft_buf, &mut smoothed, &mut block);
                samples.store(&block);
            }
        }

        if !got_any {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn analyze_window(
    scratch: &[f32],
    write_pos: usize,
    hann: &[f32],
    fft: &Arc<dyn rustfft::Fft<f32>>,
    fft_buf: &mut [Complex<f32>],
    smoothed: &mut [f32],
    block: &mut SampleBlock,
) {
    let n = fft_buf.len();

    for i in 0..n {
        let s = scratch[(write_pos + i) % n];
        fft_buf[i].re = s * hann[i];
        fft_buf[i].im = 0.0;
    }

    // Waveform bytes from the newest half of the window, silence at 128.
    for (i, w) in block.wave.iter_mut().enumerate() {
        let s = scratch[(write_pos + n / 2 + i) % n].clamp(-1.0, 1.0);
        *w = ((s * 0.5 + 0.5) * 255.0) as u8;
    }

    fft.process(fft_buf);

    // Byte magnitudes: normalize, smooth over time, then map the
    // [-100, -30] dBFS window onto 0..255.
    for (i, out) in block.freq.iter_mut().enumerate() {
        let c = fft_buf[i];
        let mag = (c.re * c.re + c.im * c.im).sqrt() / n as f32;
        smoothed[i] = smoothed[i] * SMOOTHING + mag * (1.0 - SMOOTHING);
        let db = 20.0 * smoothed[i].max(1e-10).log10();
        let scaled = (db - MIN_DB) / (MAX_DB - MIN_DB);
        *out = (scaled.clamp(0.0, 1.0) * 255.0) as u8;
    }
}
