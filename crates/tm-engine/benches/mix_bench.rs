use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tm_engine::{MixFormat, Mixer, MixerConfig, SimulatedDevice};

fn busy_mixer(format: MixFormat, voices: usize) -> (Mixer<SimulatedDevice>, Arc<[u8]>) {
    let config = MixerConfig { voices, format, page_bytes: 512, ..MixerConfig::default() };
    let mut mixer = Mixer::init(SimulatedDevice::new(), config).unwrap();
    let data: Arc<[u8]> = (0..1 << 20).map(|i: u32| (i * 7) as u8).collect::<Vec<_>>().into();
    for _ in 0..voices {
        mixer.play(data.clone(), data.len(), 1).unwrap();
    }
    (mixer, data)
}

fn bench_page_complete(c: &mut Criterion) {
    for format in [MixFormat::Mono8, MixFormat::Mono16] {
        let (mut mixer, data) = busy_mixer(format, 8);
        c.bench_function(&format!("page_complete_{format:?}_8_voices"), |b| {
            b.iter(|| {
                if mixer.pool().active_len() == 0 {
                    for _ in 0..8 {
                        mixer.play(data.clone(), data.len(), 1).unwrap();
                    }
                }
                mixer.on_page_complete();
                black_box(mixer.page(mixer.play_page())[0]);
            })
        });
    }
}

fn bench_mix_primitives(c: &mut Criterion) {
    let src: Vec<u8> = (0..512u32).map(|i| i as u8).collect();
    let mut page8 = vec![0x80u8; 512];
    let mut page16 = vec![0u8; 1024];
    c.bench_function("mix_mono8_512", |b| {
        b.iter(|| tm_engine::mix::mix_mono8(black_box(&mut page8), black_box(&src)))
    });
    c.bench_function("mix_mono16_512", |b| {
        b.iter(|| tm_engine::mix::mix_mono16(black_box(&mut page16), black_box(&src), 5))
    });
}

criterion_group!(benches, bench_page_complete, bench_mix_primitives);
criterion_main!(benches);
