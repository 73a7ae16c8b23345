//! GPU-backed capture tests. Each test returns early when no adapter exists.

use std::sync::atomic::{AtomicBool, Ordering};

use rtv_engine::CaptureError;
use rtv_engine::capture::{
    CaptureConfig, CapturePipeline, PlaneLayout, PlaneReadback, PlaneSet, StopSignal,
    padded_bytes_per_row, unpad_rows,
};
use rtv_engine::device::{Gpu, GpuInit};
use rtv_engine::render::{
    ColorMatrix, ColorSpaceConverter, FramebufferStatus, OffscreenTarget, Plane, Scene,
    SceneConfig,
};
use rtv_engine::sink::{FrameSink, MemorySink};
use rtv_engine::time::CaptureClock;

fn gpu() -> Option<Gpu> {
    match Gpu::headless(GpuInit::default()) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping: no GPU adapter ({e:#})");
            None
        }
    }
}

fn assert_near(actual: u8, expected: u8, what: &str) {
    assert!(
        actual.abs_diff(expected) <= 1,
        "{what}: got {actual}, expected {expected} +-1"
    );
}

fn static_config(width: u32, height: u32) -> CaptureConfig {
    CaptureConfig {
        width,
        height,
        rotation_rate: 0.0,
        ..CaptureConfig::default()
    }
}

/// Copies one mip level of an R8 texture back to the CPU, tightly packed.
fn read_mip(gpu: &Gpu, texture: &wgpu::Texture, mip_level: u32) -> (u32, u32, Vec<u8>) {
    let width = (texture.width() >> mip_level).max(1);
    let height = (texture.height() >> mip_level).max(1);
    let padded = padded_bytes_per_row(width);
    let buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("test mip readback"),
        size: u64::from(padded) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu.create_encoder("test mip copy");
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.submit(encoder);

    let (tx, rx) = std::sync::mpsc::channel();
    buffer.slice(..).map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    gpu.device().poll(wgpu::PollType::wait_indefinitely()).unwrap();
    rx.recv().unwrap().unwrap();

    let mut out = vec![0u8; (width * height) as usize];
    unpad_rows(
        &buffer.slice(..).get_mapped_range(),
        padded as usize,
        width as usize,
        &mut out,
    );
    buffer.unmap();
    (width, height, out)
}

#[test]
fn pure_red_converts_to_documented_yuv() {
    let Some(gpu) = gpu() else { return };
    let (w, h) = (64, 32);

    let mut source = OffscreenTarget::new();
    source.init(&gpu, w, h).unwrap();
    let mut converter = ColorSpaceConverter::new();
    converter.init(&gpu, w, h).unwrap();
    let layout = PlaneLayout::new(w, h).unwrap();
    let readback = PlaneReadback::new(&gpu, layout);

    let mut encoder = gpu.create_encoder("red source");
    source.begin(&mut encoder, wgpu::Color::RED).unwrap().end();
    converter.convert(&gpu, &mut encoder, source.color_view().unwrap());
    converter.downsample_chroma(&mut encoder);
    readback.encode_copies(&mut encoder, &converter).unwrap();
    gpu.submit(encoder);

    let mut planes = PlaneSet::new(layout);
    readback.read_into(&gpu, &mut planes).unwrap();

    let [y, u, v] = ColorMatrix::CAPTURE.apply_unorm8([255, 0, 0]);
    assert_eq!([y, u, v], [92, 90, 255]);
    for (i, &s) in planes.y.iter().enumerate() {
        assert_near(s, y, &format!("Y[{i}]"));
    }
    for (i, (&su, &sv)) in planes.u.iter().zip(&planes.v).enumerate() {
        assert_near(su, u, &format!("U[{i}]"));
        assert_near(sv, v, &format!("V[{i}]"));
    }
}

#[test]
fn ten_static_frames_at_800x600() {
    let Some(gpu) = gpu() else { return };
    let config = static_config(800, 600);
    let layout = config.layout().unwrap();

    let mut pipeline = CapturePipeline::new(&gpu, &config, MemorySink::in_memory()).unwrap();
    let stop = AtomicBool::new(false);
    let mut clock = CaptureClock::fixed_rate(config.fps);
    let captured = pipeline.run(&gpu, &stop, &mut clock, Some(10)).unwrap();
    assert_eq!(captured, 10);

    let frame_bytes = layout.frame_bytes();
    let stream = pipeline.sink().get_ref().clone();
    assert_eq!(stream.len(), 10 * (800 * 600 + 800 * 600 / 2));
    assert_eq!(pipeline.frames(), (stream.len() / frame_bytes) as u64);

    let black = ColorMatrix::CAPTURE.apply_unorm8([0, 0, 0]);
    let first = &stream[..frame_bytes];
    let last = &stream[9 * frame_bytes..];
    for (name, frame) in [("first", first), ("last", last)] {
        // Top-left corner is background in every frame.
        assert_near(frame[0], black[0], &format!("{name} frame Y"));
        assert_near(frame[layout.y_len()], black[1], &format!("{name} frame U"));
        assert_near(frame[layout.y_len() + layout.chroma_len()], black[2], &format!("{name} frame V"));
    }

    // Frame 0 is the untouched ring slot; later frames show the cube.
    assert!(first[..layout.y_len()].iter().all(|&s| s.abs_diff(black[0]) <= 1));
    assert_ne!(&first[..layout.y_len()], &last[..layout.y_len()]);

    let report = pipeline.finish().unwrap();
    assert_eq!(report.frames, 10);
    assert_eq!(report.bytes_written, 10 * frame_bytes as u64);
    assert!(report.elapsed_secs > 0.0);
    assert!((report.fps - report.frames as f64 / report.elapsed_secs).abs() < 1e-6);
}

#[test]
fn ring_indices_never_alias_and_frames_count_up() {
    let Some(gpu) = gpu() else { return };
    let config = CaptureConfig {
        ring_depth: 3,
        ..static_config(64, 64)
    };
    let mut pipeline = CapturePipeline::new(&gpu, &config, MemorySink::in_memory()).unwrap();

    for i in 0..7u64 {
        let (write, read) = pipeline.ring_indices();
        assert_ne!(write, read);
        pipeline.step(&gpu, i as f64 / 30.0, None).unwrap();
        assert_eq!(pipeline.frames(), i + 1);
        assert_eq!(
            pipeline.sink().bytes_written(),
            pipeline.frames() * pipeline.layout().frame_bytes() as u64
        );
    }
}

#[test]
fn raised_stop_signal_captures_nothing() {
    let Some(gpu) = gpu() else { return };
    let config = static_config(64, 64);
    let mut pipeline = CapturePipeline::new(&gpu, &config, MemorySink::in_memory()).unwrap();

    let stop = AtomicBool::new(true);
    assert!(stop.should_stop());
    let captured = pipeline.run(&gpu, &stop, &mut CaptureClock::new(), None).unwrap();
    assert_eq!(captured, 0);

    stop.store(false, Ordering::Release);
    let captured = pipeline.run(&gpu, &stop, &mut CaptureClock::new(), Some(2)).unwrap();
    assert_eq!(captured, 2);
    assert_eq!(pipeline.finish().unwrap().frames, 2);
}

#[test]
fn reinit_fails_and_keeps_existing_target() {
    let Some(gpu) = gpu() else { return };
    let mut target = OffscreenTarget::new();
    target.init(&gpu, 64, 64).unwrap();
    let before = target.color_texture().unwrap().clone();

    let err = target.init(&gpu, 128, 128).unwrap_err();
    assert!(matches!(err, CaptureError::AlreadyInitialized));
    assert_eq!(target.size(), Some((64, 64)));
    assert_eq!(target.color_texture().unwrap(), &before);

    let mut converter = ColorSpaceConverter::new();
    converter.init(&gpu, 64, 64).unwrap();
    assert!(matches!(
        converter.init(&gpu, 64, 64),
        Err(CaptureError::AlreadyInitialized)
    ));
    assert_eq!(converter.size(), Some((64, 64)));
}

#[test]
fn oversized_target_is_incomplete_and_allocates_nothing() {
    let Some(gpu) = gpu() else { return };
    let max = gpu.device().limits().max_texture_dimension_2d;

    let mut target = OffscreenTarget::new();
    let err = target.init(&gpu, max + 2, 64).unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Incomplete(FramebufferStatus::IncompleteDimensions { .. })
    ));
    assert!(!target.is_initialized());
}

#[test]
fn memory_sink_is_finished_exactly_once_by_pipeline() {
    let Some(gpu) = gpu() else { return };
    let config = static_config(16, 16);
    let mut pipeline = CapturePipeline::new(&gpu, &config, MemorySink::in_memory()).unwrap();
    pipeline.step(&gpu, 0.0, None).unwrap();
    let report = pipeline.finish().unwrap();
    assert_eq!(report.bytes_written, PlaneLayout::new(16, 16).unwrap().frame_bytes() as u64);
}

#[test]
fn chroma_mip_is_the_2x2_average_of_full_resolution_chroma() {
    let Some(gpu) = gpu() else { return };
    let (w, h) = (64, 64);

    let mut scene = Scene::new(
        &gpu,
        SceneConfig {
            width: w,
            height: h,
            rotation_rate: 0.0,
        },
    )
    .unwrap();
    scene.update(0.0);
    let mut source = OffscreenTarget::new();
    source.init(&gpu, w, h).unwrap();
    let mut converter = ColorSpaceConverter::new();
    converter.init(&gpu, w, h).unwrap();

    let mut encoder = gpu.create_encoder("cube source");
    {
        let mut pass = source.begin(&mut encoder, Scene::CLEAR_COLOR).unwrap();
        scene.render(gpu.queue(), &mut pass);
        pass.end();
    }
    converter.convert(&gpu, &mut encoder, source.color_view().unwrap());
    converter.downsample_chroma(&mut encoder);
    gpu.submit(encoder);

    for plane in [Plane::U, Plane::V] {
        let texture = converter.plane_texture(plane).unwrap();
        let (fw, _, full) = read_mip(&gpu, texture, 0);
        let (hw, hh, half) = read_mip(&gpu, texture, 1);
        assert_eq!((hw, hh), (w / 2, h / 2));

        let mut mixed_blocks = 0;
        for y in 0..hh as usize {
            for x in 0..hw as usize {
                let at = |dx: usize, dy: usize| full[(2 * y + dy) * fw as usize + 2 * x + dx];
                let block = [at(0, 0), at(1, 0), at(0, 1), at(1, 1)];
                if block.iter().any(|&b| b != block[0]) {
                    mixed_blocks += 1;
                }
                let sum: u32 = block.iter().map(|&b| u32::from(b)).sum();
                let average = ((sum as f32) / 4.0).round() as u8;
                let what = format!("{plane:?} mip1[{x},{y}]");
                assert_near(half[y * hw as usize + x], average, &what);
            }
        }
        // The cube edges must leave blocks that a copy of one texel would get wrong.
        assert!(mixed_blocks > 0, "{plane:?}: source chroma is uniform");
    }
}

#[test]
fn invalid_shader_fails_resource_creation() {
    let Some(gpu) = gpu() else { return };

    let scope = gpu.validation_scope("broken shader");
    gpu.device()
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("broken shader"),
            source: wgpu::ShaderSource::Wgsl(
                "@fragment fn fs_main() -> @location(0) vec4<f32> { return missing; }".into(),
            ),
        });
    match scope.finish() {
        Err(CaptureError::Gpu(msg)) => assert!(msg.starts_with("broken shader"), "{msg}"),
        other => panic!("expected a validation failure, got {other:?}"),
    }

    // The device stays usable and well-formed resources still pass.
    let scope = gpu.validation_scope("valid buffer");
    gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("valid buffer"),
        size: 256,
        usage: wgpu::BufferUsages::UNIFORM,
        mapped_at_creation: false,
    });
    assert!(scope.finish().is_ok());

    assert!(
        Scene::new(
            &gpu,
            SceneConfig {
                width: 16,
                height: 16,
                rotation_rate: 0.0,
            },
        )
        .is_ok()
    );
}
