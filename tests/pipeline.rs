//! End-to-end tests of the morph pipeline, using stub detection/landmark collaborators.

use std::thread;

use kao::detection::{BoundingRect, Detection, FaceDetector};
use kao::image::{Color, Image, ImageView, Rect};
use kao::landmark::{LandmarkExtractor, Landmarks, Point};
use kao::morph::ReferenceIdentity;
use kao::pipeline::{FaceMorpher, ReferenceSlot};

/// Returns the same detections for every frame.
struct StubDetector {
    detections: Vec<Detection>,
}

impl StubDetector {
    fn none() -> Self {
        Self {
            detections: Vec::new(),
        }
    }

    fn single(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Self {
        Self {
            detections: vec![Detection::new(
                confidence,
                BoundingRect::from_top_left(x, y, w, h),
            )],
        }
    }
}

impl FaceDetector for StubDetector {
    fn detect(&mut self, _image: &ImageView<'_>) -> Vec<Detection> {
        self.detections.clone()
    }
}

/// Produces a fixed 3x3 landmark grid over the queried image, or nothing at all.
struct GridLandmarker {
    fail: bool,
}

impl GridLandmarker {
    fn working() -> Self {
        Self { fail: false }
    }

    fn failing() -> Self {
        Self { fail: true }
    }

    fn grid(width: i32, height: i32) -> Vec<Point> {
        let mut points = Vec::new();
        for gy in 1..4 {
            for gx in 1..4 {
                points.push([gx * width / 4, gy * height / 4]);
            }
        }
        points
    }
}

impl LandmarkExtractor for GridLandmarker {
    fn extract(&mut self, image: &ImageView<'_>) -> Option<Landmarks> {
        if self.fail {
            return None;
        }
        Some(Landmarks::from_points(Self::grid(
            image.width() as i32,
            image.height() as i32,
        )))
    }
}

fn gradient_frame(width: u32, height: u32) -> Image {
    let mut image = Image::new(width, height);
    for y in 0..height {
        for x in 0..width {
            image.set(
                x,
                y,
                Color::from_rgb8(
                    (x * 255 / width) as u8,
                    (y * 255 / height) as u8,
                    ((x + y) % 256) as u8,
                ),
            );
        }
    }
    image
}

fn solid(width: u32, height: u32, color: Color) -> Image {
    let mut image = Image::new(width, height);
    image.clear(color);
    image
}

/// Installs a reference identity without going through a landmark extractor.
fn install_reference(slot: &ReferenceSlot, image: Image) {
    let marks = Landmarks::from_points(GridLandmarker::grid(
        image.width() as i32,
        image.height() as i32,
    ));
    slot.set(ReferenceIdentity::new(image, &marks));
}

#[test]
fn passthrough_without_reference() {
    let mut morpher = FaceMorpher::new(
        StubDetector::single(100.0, 100.0, 200.0, 200.0, 0.9),
        GridLandmarker::working(),
    );

    let mut frame = gradient_frame(640, 480);
    let before = frame.data().to_vec();
    morpher.process_frame(&mut frame);
    assert_eq!(frame.data(), &before[..]);
}

#[test]
fn passthrough_without_detections() {
    let mut morpher = FaceMorpher::new(StubDetector::none(), GridLandmarker::working());
    assert!(morpher.set_reference(&solid(400, 400, Color::RED)));

    let mut frame = gradient_frame(640, 480);
    let before = frame.data().to_vec();
    morpher.process_frame(&mut frame);
    assert_eq!(frame.data(), &before[..]);
}

#[test]
fn passthrough_when_landmarks_fail() {
    let mut morpher = FaceMorpher::new(
        StubDetector::single(100.0, 100.0, 200.0, 200.0, 0.9),
        GridLandmarker::failing(),
    );
    install_reference(&morpher.reference_slot(), solid(400, 400, Color::RED));

    let mut frame = gradient_frame(640, 480);
    let before = frame.data().to_vec();
    morpher.process_frame(&mut frame);
    assert_eq!(frame.data(), &before[..]);
}

#[test]
fn morph_modifies_only_the_crop_region() {
    let mut morpher = FaceMorpher::new(
        StubDetector::single(100.0, 100.0, 200.0, 200.0, 0.9),
        GridLandmarker::working(),
    );
    assert!(morpher.set_reference(&solid(400, 400, Color::RED)));

    let mut frame = gradient_frame(640, 480);
    let before = frame.clone();
    morpher.process_frame(&mut frame);

    // detection box (100,100,200,200) with margin 0.25 -> crop (50,50)-(350,350)
    let crop = Rect::from_top_left(50, 50, 300, 300);
    let mut changed = 0u32;
    for (x, y) in frame.rect().iter_coords() {
        let (x, y) = (x as u32, y as u32);
        let inside = (50..350).contains(&x) && (50..350).contains(&y);
        if !inside {
            assert_eq!(
                frame.get(x, y),
                before.get(x, y),
                "pixel ({x},{y}) outside crop {crop:?} was modified"
            );
        } else if frame.get(x, y) != before.get(x, y) {
            changed += 1;
        }
    }
    assert!(changed > 0, "morphing did not change the crop region");
}

#[test]
fn blend_factor_zero_is_identity() {
    let mut morpher = FaceMorpher::new(
        StubDetector::single(100.0, 100.0, 200.0, 200.0, 0.9),
        GridLandmarker::working(),
    );
    morpher.set_blend_factor(0.0);
    assert!(morpher.set_reference(&solid(400, 400, Color::RED)));

    let mut frame = gradient_frame(640, 480);
    let before = frame.data().to_vec();
    morpher.process_frame(&mut frame);
    assert_eq!(frame.data(), &before[..]);
}

#[test]
fn highest_confidence_detection_wins() {
    let detector = StubDetector {
        detections: vec![
            Detection::new(0.3, BoundingRect::from_top_left(20.0, 100.0, 80.0, 80.0)),
            Detection::new(0.9, BoundingRect::from_top_left(400.0, 100.0, 80.0, 80.0)),
        ],
    };
    let mut morpher = FaceMorpher::new(detector, GridLandmarker::working());
    assert!(morpher.set_reference(&solid(400, 400, Color::RED)));

    let mut frame = gradient_frame(640, 480);
    let before = frame.clone();
    morpher.process_frame(&mut frame);

    // the low-confidence face on the left must be untouched
    for (x, y) in Rect::from_top_left(0, 0, 200, 480).iter_coords() {
        assert_eq!(frame.get(x as u32, y as u32), before.get(x as u32, y as u32));
    }
    // the high-confidence face on the right must have changed
    let mut changed = false;
    for (x, y) in Rect::from_top_left(380, 80, 180, 180).iter_coords() {
        if frame.get(x as u32, y as u32) != before.get(x as u32, y as u32) {
            changed = true;
            break;
        }
    }
    assert!(changed);
}

#[test]
fn failed_set_reference_keeps_previous_identity() {
    let mut morpher = FaceMorpher::new(StubDetector::none(), GridLandmarker::failing());
    let slot = morpher.reference_slot();

    install_reference(&slot, solid(400, 400, Color::RED));
    let installed = slot.get().unwrap().version();

    assert!(!morpher.set_reference(&solid(400, 400, Color::BLUE)));
    assert_eq!(slot.get().unwrap().version(), installed);
}

#[test]
fn reference_replacement_is_atomic() {
    // Identity pairs are marked consistently: a red image always carries the [10,10] landmark, a
    // blue image the [20,20] one. A reader must never see a mixed pair, no matter how the writer
    // interleaves.
    fn make(color: Color, marker: i32) -> ReferenceIdentity {
        let marks = Landmarks::from_points(vec![
            [marker, marker],
            [30, 10],
            [20, 30],
            [10, 25],
        ]);
        ReferenceIdentity::new(solid(40, 40, color), &marks)
    }

    let slot = ReferenceSlot::new();
    slot.set(make(Color::RED, 10));

    thread::scope(|scope| {
        let writer_slot = slot.clone();
        scope.spawn(move || {
            for _ in 0..500 {
                writer_slot.set(make(Color::RED, 10));
                writer_slot.set(make(Color::BLUE, 20));
            }
        });

        for _ in 0..2000 {
            let reference = slot.get().unwrap();
            let marker = reference.points()[0];
            let color = reference.image().get(0, 0);
            let expected = if color == Color::RED {
                [10, 10]
            } else if color == Color::BLUE {
                [20, 20]
            } else {
                panic!("unexpected reference image color {color:?}");
            };
            assert_eq!(marker, expected, "observed a torn image/point-set pair");
        }
    });
}
