use std::sync::Arc;

use image::{Rgb, RgbImage};
use markless::{
    BatchEvent, BatchRunner, BatchState, DetectionParams, ImageJob, NeighborhoodFill,
    WatermarkRemover,
};

fn engine() -> WatermarkRemover {
    WatermarkRemover::new(Arc::new(NeighborhoodFill))
}

fn fill_box(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) {
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
}

#[test]
fn mask_dimensions_track_the_image() {
    let params = DetectionParams::default();
    for (w, h) in [(64, 64), (301, 97), (1280, 720)] {
        let img = RgbImage::new(w, h);
        let found = engine().locate(&img, &params);
        assert_eq!(found.mask.dimensions(), (w, h));
        assert!(
            found.mask.pixels().any(|p| p[0] == 255),
            "mask must never be empty ({w}x{h})"
        );
    }
}

#[test]
fn locate_has_no_hidden_state() {
    let mut img = RgbImage::new(320, 240);
    fill_box(&mut img, 250, 215, 290, 230);

    let e = engine();
    let params = DetectionParams::default();
    let first = e.locate(&img, &params);
    let second = e.locate(&img, &params);
    assert_eq!(first.mask.as_raw(), second.mask.as_raw());
    assert_eq!(first.candidate_count, second.candidate_count);
}

#[test]
fn edge_free_image_gets_the_default_corner_mask() {
    // 640x480 with default ratios: region is 192x72, so the fallback box
    // is capped at 200x50 -> 192x50, anchored bottom-right.
    let img = RgbImage::new(640, 480);
    let found = engine().locate(&img, &DetectionParams::default());
    assert!(found.used_fallback);

    for y in 0..480 {
        for x in 0..640 {
            let inside = x >= 640 - 192 && y >= 480 - 50;
            assert_eq!(
                found.mask.get_pixel(x, y)[0] == 255,
                inside,
                "pixel ({x},{y})"
            );
        }
    }
}

#[test]
fn separate_overlays_are_both_masked() {
    let mut img = RgbImage::new(400, 200);
    // Two bright overlays inside the 120x30 bottom-right search region.
    fill_box(&mut img, 290, 175, 315, 185);
    fill_box(&mut img, 340, 185, 365, 195);

    let found = engine().locate(&img, &DetectionParams::default());
    assert!(!found.used_fallback);
    assert!(found.candidate_count >= 2);
    assert_eq!(found.mask.get_pixel(302, 180)[0], 255, "first overlay");
    assert_eq!(found.mask.get_pixel(352, 190)[0], 255, "second overlay");
}

#[test]
fn single_file_pipeline_writes_a_cleaned_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photo.png");
    let output = dir.path().join("photo_cleaned.png");

    let mut img = RgbImage::new(200, 150);
    for px in img.pixels_mut() {
        *px = Rgb([80, 80, 80]);
    }
    fill_box(&mut img, 150, 130, 180, 142);
    img.save(&input).unwrap();

    engine()
        .process_file(&input, &output, &DetectionParams::default())
        .unwrap();

    let cleaned = image::open(&output).unwrap().to_rgb8();
    assert_eq!(cleaned.dimensions(), (200, 150));
    // The overlay should no longer be pure white after reconstruction.
    assert_ne!(*cleaned.get_pixel(165, 136), Rgb([255, 255, 255]));
}

#[test]
fn batch_processes_around_a_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("cleaned");

    let first = dir.path().join("one.png");
    let missing = dir.path().join("two.png");
    let third = dir.path().join("three.png");
    RgbImage::new(40, 40).save(&first).unwrap();
    RgbImage::new(40, 40).save(&third).unwrap();

    let jobs: Vec<ImageJob> = [&first, &missing, &third]
        .iter()
        .map(|input| ImageJob {
            input: input.to_path_buf(),
            output: out_dir.join(input.file_name().unwrap()),
            params: DetectionParams::default(),
        })
        .collect();

    let runner = BatchRunner::new(Arc::new(engine()));
    let handle = runner.start(jobs);
    let events: Vec<BatchEvent> = handle.events.iter().collect();
    let outcome = handle.wait();

    assert_eq!(outcome.state, BatchState::Completed);
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.processed, 3);
    assert_eq!(outcome.succeeded, 2);

    let started = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::Started { .. }))
        .count();
    let finished = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::Finished { .. }))
        .count();
    assert_eq!(started, 3);
    assert_eq!(finished, 2);

    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            BatchEvent::Progress { completed, total } => Some((*completed, *total)),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_progress, (3, 3));

    assert!(out_dir.join("one.png").exists());
    assert!(!out_dir.join("two.png").exists());
    assert!(out_dir.join("three.png").exists());
}
