// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use arbor_control::{logging, ArborConfig, MasterControl, VirtualUniverse};
use arbor_core::math::{Aabb, Vec3};
use arbor_core::{SensorId, TicketAllocator};
use arbor_data::behavior::{Behavior, BehaviorContext};
use arbor_data::component::{AttributeValue, Material, RetainedComponent};
use arbor_data::input::{InputDevice, ProcessingMode, SensorHandle};
use arbor_data::wakeup::{Criterion, Wakeup};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const PULSE_POST: i64 = 1;

/// Posts a pulse every 100 ms.
struct Metronome;

impl Behavior for Metronome {
    fn initialize(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()> {
        ctx.wakeup_on(Criterion::ElapsedTime(Duration::from_millis(100)));
        Ok(())
    }

    fn process_stimulus(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()> {
        ctx.post_id(PULSE_POST);
        ctx.wakeup_on(Criterion::ElapsedTime(Duration::from_millis(100)));
        Ok(())
    }
}

/// Counts pulses, and sensor entries into the unit box.
struct Watcher {
    pulses: Arc<AtomicU32>,
    entries: Arc<AtomicU32>,
}

impl Watcher {
    fn wakeup() -> Result<Wakeup> {
        let unit = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        Ok(Wakeup::or([
            Criterion::BehaviorPost {
                source: None,
                post_id: Some(PULSE_POST),
            },
            Criterion::SensorEntry(unit),
        ])?)
    }
}

impl Behavior for Watcher {
    fn initialize(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()> {
        ctx.wakeup_on(Self::wakeup()?);
        Ok(())
    }

    fn process_stimulus(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()> {
        for criterion in ctx.triggered_criteria() {
            match criterion {
                Criterion::BehaviorPost { .. } => {
                    self.pulses.fetch_add(1, Ordering::Relaxed);
                }
                Criterion::SensorEntry(_) => {
                    self.entries.fetch_add(1, Ordering::Relaxed);
                    log::info!("Sensor {:?} entered the unit box.", ctx.triggering_sensor());
                }
                _ => {}
            }
        }
        ctx.wakeup_on(Self::wakeup()?);
        Ok(())
    }
}

/// A tracker orbiting the origin, polled by the input scheduler.
struct Orbit {
    handle: SensorHandle,
    started: Instant,
}

impl InputDevice for Orbit {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.started = Instant::now();
        Ok(())
    }

    fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::NonBlocking
    }

    fn poll_and_process_input(&mut self) -> anyhow::Result<()> {
        let angle = self.started.elapsed().as_secs_f32() * std::f32::consts::PI;
        self.handle
            .publish(Vec3::new(2.0 * angle.cos(), 0.0, 0.0), 0);
        Ok(())
    }

    fn sensor_ids(&self) -> Vec<SensorId> {
        vec![self.handle.id()]
    }

    fn close(&mut self) {
        log::info!("Orbit tracker closed.");
    }
}

fn fade(universe: &VirtualUniverse, material: &mut RetainedComponent, t: f32) {
    universe.update_component(material, |value| {
        if let AttributeValue::Material(m) = value {
            m.diffuse = Vec3::new(t, 1.0 - t, 0.5);
        }
    });
}

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ArborConfig::load(path)?,
        None => ArborConfig::default(),
    };
    logging::init(&config.log_filter);

    let mut control = MasterControl::new(config);
    let universe = VirtualUniverse::attach(&control, Arc::new(TicketAllocator::new()));

    let pulses = Arc::new(AtomicU32::new(0));
    let entries = Arc::new(AtomicU32::new(0));
    universe.add_behavior(Metronome);
    universe.add_behavior(Watcher {
        pulses: Arc::clone(&pulses),
        entries: Arc::clone(&entries),
    });
    universe.add_device(Arc::new(Mutex::new(Orbit {
        handle: universe.sensors().register(SensorId(1)),
        started: Instant::now(),
    })))?;
    let mut material = universe.add_component(Material::default());

    control.start()?;
    let run_for = Duration::from_secs(2);
    let started = Instant::now();
    while started.elapsed() < run_for {
        let t = started.elapsed().as_secs_f32() / run_for.as_secs_f32();
        fade(&universe, &mut material, t);
        std::thread::sleep(Duration::from_millis(50));
    }
    control.shutdown();

    let mirror_version = universe
        .attributes()
        .lock()
        .map(|a| a.mirror(material.id()).map_or(0, |m| m.version()))
        .unwrap_or(0);
    log::info!(
        "Ran {} frames: {} pulses, {} sensor entries, material mirror at version {}.",
        control.frame(),
        pulses.load(Ordering::Relaxed),
        entries.load(Ordering::Relaxed),
        mirror_version
    );
    Ok(())
}
