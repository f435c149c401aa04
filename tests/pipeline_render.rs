use prismatte::{
    CancelFlag, Canvas, Clip, EffectInstance, EffectParams, Fps, FrameIndex, FrameSource,
    ImageBuf, LutRegistry, Pipeline, Project, ProjectSettings, RenderContext, SolidSource,
    Transition, TransitionAlign, TransitionKind,
};

fn settings(w: u32, h: u32) -> ProjectSettings {
    ProjectSettings::new(
        Canvas {
            width: w,
            height: h,
        },
        Fps::new(30, 1).unwrap(),
    )
}

struct FixedSource(ImageBuf);
impl FrameSource for FixedSource {
    fn get_frame(&mut self, _media_id: &str, _time_secs: f64) -> Option<ImageBuf> {
        Some(self.0.clone())
    }
}

fn quad_2x2() -> ImageBuf {
    let mut img = ImageBuf::transparent(2, 2);
    img.put_pixel(0, 0, [255, 0, 0, 255]);
    img.put_pixel(1, 0, [0, 255, 0, 255]);
    img.put_pixel(0, 1, [0, 0, 255, 255]);
    img.put_pixel(1, 1, [255, 255, 255, 255]);
    img
}

fn clip_with_effect(params: EffectParams) -> Clip {
    let mut clip = Clip::new("c0", "m0", (2, 2));
    clip.source_out_frame = FrameIndex(100);
    clip.effects.push(EffectInstance::new("fx0", params));
    clip
}

#[test]
fn identity_passthrough_scenario() {
    // brightness-contrast with both sliders at zero returns identical bytes.
    let settings = settings(2, 2);
    let luts = LutRegistry::new();
    let ctx = RenderContext {
        settings: &settings,
        luts: &luts,
        cancel: CancelFlag::new(),
    };
    let src = quad_2x2();
    let clip = clip_with_effect(EffectParams::BrightnessContrast {
        brightness: 0.0,
        contrast: 0.0,
    });

    let mut pipeline = Pipeline::new();
    let out = pipeline.render_clip_frame(
        &clip,
        FrameIndex(0),
        &mut FixedSource(src.clone()),
        None,
        &ctx,
    );
    assert_eq!(out.data, src.data);
}

#[test]
fn zero_amount_effects_are_identity() {
    let settings = settings(2, 2);
    let luts = LutRegistry::new();
    let ctx = RenderContext {
        settings: &settings,
        luts: &luts,
        cancel: CancelFlag::new(),
    };
    let src = quad_2x2();

    let zero_effects = [
        EffectParams::Saturation { amount: 100.0 },
        EffectParams::HueRotate { degrees: 0.0 },
        EffectParams::Invert { amount: 0.0 },
        EffectParams::Grayscale { amount: 0.0 },
        EffectParams::Sepia { amount: 0.0 },
        EffectParams::Sharpen { amount: 0.0 },
        EffectParams::GaussianBlur { radius: 0.0 },
        EffectParams::HslAdjust {
            hue: 0.0,
            saturation: 0.0,
            lightness: 0.0,
        },
    ];
    for params in zero_effects {
        let clip = clip_with_effect(params.clone());
        let mut pipeline = Pipeline::new();
        let out = pipeline.render_clip_frame(
            &clip,
            FrameIndex(0),
            &mut FixedSource(src.clone()),
            None,
            &ctx,
        );
        assert_eq!(out.data, src.data, "effect {params:?} must be identity");
    }
}

#[test]
fn double_blur_approximates_sqrt2_blur() {
    // Two passes at radius r behave like one at r*sqrt(2): a sanity bound on
    // the centre pixel, not a bit-exact identity.
    let settings = settings(15, 15);
    let luts = LutRegistry::new();
    let ctx = RenderContext {
        settings: &settings,
        luts: &luts,
        cancel: CancelFlag::new(),
    };
    let mut src = ImageBuf::transparent(15, 15);
    src.put_pixel(7, 7, [255, 255, 255, 255]);

    let mut twice = Clip::new("c0", "m0", (15, 15));
    twice.source_out_frame = FrameIndex(10);
    twice
        .effects
        .push(EffectInstance::new("b1", EffectParams::GaussianBlur { radius: 2.0 }));
    twice
        .effects
        .push(EffectInstance::new("b2", EffectParams::GaussianBlur { radius: 2.0 }));

    let mut once = Clip::new("c1", "m0", (15, 15));
    once.source_out_frame = FrameIndex(10);
    once.effects.push(EffectInstance::new(
        "b3",
        EffectParams::GaussianBlur {
            radius: 2.0 * std::f64::consts::SQRT_2,
        },
    ));

    let mut pipeline = Pipeline::new();
    let a = pipeline.render_clip_frame(
        &twice,
        FrameIndex(0),
        &mut FixedSource(src.clone()),
        None,
        &ctx,
    );
    let b = pipeline.render_clip_frame(
        &once,
        FrameIndex(0),
        &mut FixedSource(src.clone()),
        None,
        &ctx,
    );

    let center = |img: &ImageBuf| i32::from(img.pixel(7, 7)[3]);
    assert!((center(&a) - center(&b)).abs() <= 8);
}

#[test]
fn animated_blur_radius_resolves_per_frame() {
    use prismatte::{Easing, ParamId};

    let settings = settings(9, 9);
    let luts = LutRegistry::new();
    let ctx = RenderContext {
        settings: &settings,
        luts: &luts,
        cancel: CancelFlag::new(),
    };
    let mut src = ImageBuf::transparent(9, 9);
    src.put_pixel(4, 4, [255, 255, 255, 255]);

    let mut clip = Clip::new("c0", "m0", (9, 9));
    clip.source_out_frame = FrameIndex(100);
    let mut fx = EffectInstance::new("blur", EffectParams::GaussianBlur { radius: 0.0 });
    fx.set_keyframe(ParamId::Radius, FrameIndex(0), 0.0, Easing::Linear);
    fx.set_keyframe(ParamId::Radius, FrameIndex(10), 4.0, Easing::Linear);
    clip.effects.push(fx);

    let mut pipeline = Pipeline::new();
    let sharp = pipeline.render_clip_frame(
        &clip,
        FrameIndex(0),
        &mut FixedSource(src.clone()),
        None,
        &ctx,
    );
    let soft = pipeline.render_clip_frame(
        &clip,
        FrameIndex(10),
        &mut FixedSource(src.clone()),
        None,
        &ctx,
    );

    // Frame 0: radius 0, the impulse is untouched. Frame 10: spread out.
    assert_eq!(sharp.pixel(4, 4)[3], 255);
    assert!(soft.pixel(4, 4)[3] < 200);
    assert!(soft.pixel(2, 4)[3] > 0);
}

#[test]
fn transition_blends_claimed_pair() {
    let settings = settings(2, 1);
    let luts = LutRegistry::new();
    let ctx = RenderContext {
        settings: &settings,
        luts: &luts,
        cancel: CancelFlag::new(),
    };

    struct TwoMedia;
    impl FrameSource for TwoMedia {
        fn get_frame(&mut self, media_id: &str, _t: f64) -> Option<ImageBuf> {
            let mut img = ImageBuf::transparent(2, 1);
            let px = if media_id == "a" {
                [255, 0, 0, 255]
            } else {
                [0, 0, 255, 255]
            };
            img.put_pixel(0, 0, px);
            img.put_pixel(1, 0, px);
            Some(img)
        }
    }

    let mut out_clip = Clip::new("ca", "a", (2, 1));
    out_clip.source_out_frame = FrameIndex(20);
    let mut in_clip = Clip::new("cb", "b", (2, 1));
    in_clip.source_out_frame = FrameIndex(20);

    let project = Project {
        settings: settings.clone(),
        clips: vec![out_clip, in_clip],
        transitions: vec![Transition {
            id: "t0".into(),
            kind: TransitionKind::CrossDissolve,
            duration_frames: 10,
            out_clip_id: "ca".into(),
            in_clip_id: "cb".into(),
            edit_point: FrameIndex(0),
            align: TransitionAlign::Start,
            offset: 0,
        }],
    };

    let mut pipeline = Pipeline::new();
    let mid = pipeline.render_frame(&project, FrameIndex(5), &mut TwoMedia, None, &ctx);
    let px = mid.pixel(0, 0);
    assert!((i32::from(px[0]) - 127).abs() <= 1);
    assert!((i32::from(px[2]) - 127).abs() <= 1);
    assert_eq!(px[3], 255);
}

#[test]
fn lumetri_exposure_brightens_render() {
    let settings = settings(2, 2);
    let luts = LutRegistry::new();
    let ctx = RenderContext {
        settings: &settings,
        luts: &luts,
        cancel: CancelFlag::new(),
    };
    let mut lumetri = prismatte::LumetriParams::default();
    lumetri.basic.exposure = 1.0;
    let clip = clip_with_effect(EffectParams::LumetriColor(Box::new(lumetri)));

    let mut source = SolidSource {
        width: 2,
        height: 2,
        rgba: [60, 60, 60, 255],
    };
    let mut pipeline = Pipeline::new();
    let out = pipeline.render_clip_frame(&clip, FrameIndex(0), &mut source, None, &ctx);
    assert_eq!(out.pixel(0, 0)[0], 120);
}

#[test]
fn linear_compositing_roundtrips_srgb() {
    // With no effects between linearize and delinearize the roundtrip is
    // identity up to 8-bit rounding.
    let mut s = settings(2, 2);
    s.linear_compositing = true;
    let luts = LutRegistry::new();
    let ctx = RenderContext {
        settings: &s,
        luts: &luts,
        cancel: CancelFlag::new(),
    };
    let src = quad_2x2();
    let mut clip = Clip::new("c0", "m0", (2, 2));
    clip.source_out_frame = FrameIndex(10);

    let mut pipeline = Pipeline::new();
    let out = pipeline.render_clip_frame(
        &clip,
        FrameIndex(0),
        &mut FixedSource(src.clone()),
        None,
        &ctx,
    );
    for (a, b) in out.data.iter().zip(src.data.iter()) {
        assert!((i32::from(*a) - i32::from(*b)).abs() <= 1);
    }
}
