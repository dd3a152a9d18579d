//! Ray-cast demo application
//!
//! Scatters boxes, a few avatars and rolling terrain over a region, then
//! casts a batch of random rays through it and logs what they hit.
//!
//! Usage: `raycast_demo [config.toml|config.ron] [seed]`

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nalgebra::{UnitQuaternion, Vector3};
use rand::prelude::*;
use raycast_engine::foundation::logging;
use raycast_engine::prelude::*;

const REGION_SIZE: usize = 256;
const GROUP_COUNT: u64 = 400;
const AVATAR_COUNT: u64 = 12;
const RAY_COUNT: usize = 200;
const MAX_RETRIES: usize = 5;

fn build_scene(rng: &mut StdRng) -> StaticScene {
    let extent = REGION_SIZE as f32;
    let mut scene = StaticScene::new().with_heightmap(GridHeightmap::from_fn(REGION_SIZE, REGION_SIZE, |x, y| {
        let (x, y) = (x as f32, y as f32);
        20.0 + (x * 0.05).sin() * 6.0 + (y * 0.03).cos() * 4.0
    }));

    for i in 0..GROUP_COUNT {
        let position = Vec3::new(
            rng.gen_range(0.0..extent),
            rng.gen_range(0.0..extent),
            rng.gen_range(20.0..60.0),
        );
        let size = Vec3::new(
            rng.gen_range(0.5..8.0),
            rng.gen_range(0.5..8.0),
            rng.gen_range(0.5..4.0),
        );
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), rng.gen_range(0.0..std::f32::consts::TAU));
        let shape = if rng.gen_bool(0.8) {
            ShapeDescriptor::cube()
        } else {
            ShapeDescriptor::cylinder()
        };

        let group = ObjectGroup::single(EntityId(1000 + i), Transform::new(position, rotation, size), shape)
            .with_physical(rng.gen_bool(0.3))
            .with_phantom(rng.gen_bool(0.05));
        scene.add_group(group);
    }

    for i in 0..AVATAR_COUNT {
        let position = Vec3::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent), 25.0);
        scene.add_presence(Presence::new(EntityId(10 + i), position, Vec3::new(0.6, 0.45, 1.9)));
    }
    scene
}

fn random_ray(rng: &mut StdRng) -> (Vec3, Vec3) {
    let extent = REGION_SIZE as f32;
    let start = Vec3::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent), rng.gen_range(40.0..90.0));
    let end = Vec3::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent), rng.gen_range(0.0..30.0));
    (start, end)
}

fn load_config(path: Option<&str>) -> Result<RaycastConfig, ConfigError> {
    match path {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            RaycastConfig::load_from_file(path)
        }
        None => Ok(RaycastConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    log::info!("Starting ray-cast demo");

    let mut args = std::env::args().skip(1);
    let config = load_config(args.next().as_deref())?;
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(7_u64);

    let service = RaycastService::from_config(config, Arc::new(BoxMeshGenerator), Arc::new(MonotonicClock::new()))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let scene = build_scene(&mut rng);
    log::info!(
        "Scene ready: {} groups, {} avatars, {}x{} terrain (seed {})",
        GROUP_COUNT,
        AVATAR_COUNT,
        REGION_SIZE,
        REGION_SIZE,
        seed
    );

    let options = [
        OptionValue::Int(CastRayOption::MAX_HITS),
        OptionValue::Int(4),
        OptionValue::Int(CastRayOption::DATA_FLAGS),
        OptionValue::Int((DataFlags::GET_NORMAL | DataFlags::GET_LINK_NUM).bits() as i32),
    ];

    let (mut hits, mut misses, mut throttled) = (0_usize, 0_usize, 0_usize);
    for ray in 0..RAY_COUNT {
        let caller = CallerContext::new(RegionId(1), AgentId(10 + (ray as u64 % AVATAR_COUNT)));
        let (start, end) = random_ray(&mut rng);

        let mut attempt = 0;
        let outcome = loop {
            match service.cast_ray(&scene, &caller, start, end, &options) {
                Err(CastRayError::InsufficientTime { available_ms }) if attempt < MAX_RETRIES => {
                    log::debug!("Throttled with {:.2} ms left, backing off", available_ms);
                    throttled += 1;
                    attempt += 1;
                    thread::sleep(Duration::from_millis(100));
                }
                other => break other,
            }
        };

        match outcome {
            Ok(CastOutcome::Hits(list)) => {
                hits += 1;
                if let Some(nearest) = list.first() {
                    log::info!(
                        "Ray {:3}: {} hit(s), nearest {} (link {}) at {:.2} m",
                        ray,
                        list.len(),
                        nearest.part_id,
                        nearest.link_number,
                        nearest.distance
                    );
                }
            }
            Ok(CastOutcome::NoHit) => misses += 1,
            Err(e) => log::warn!("Ray {:3} failed: {}", ray, e),
        }
    }

    let cache = service.meshes().cache().stats();
    log::info!(
        "Done: {} rays hit, {} missed, {} throttled retries; mesh cache {} entries, {} hits, {} misses",
        hits,
        misses,
        throttled,
        cache.entries,
        cache.hits,
        cache.misses
    );
    Ok(())
}
