//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Uniform baseline attacker used for comparison runs.

use gaco_common::Technique;
use gaco_grid::Phase;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::request::{
    AttackRequest, BlockCommandParams, DeviceState, InjectLoadParams, SpoofParams, SpoofTarget,
    ToggleDeviceParams,
};

const RANDOM_TECHNIQUES: [Technique; 4] = [
    Technique::SpoofData,
    Technique::InjectLoad,
    Technique::BlockCommand,
    Technique::ToggleDevice,
];

const DEVICES: [&str; 3] = ["switch1", "breaker1", "regulator1"];

/// Pick a non-reconnaissance technique uniformly.
pub fn random_technique<R: Rng + ?Sized>(rng: &mut R) -> Technique {
    RANDOM_TECHNIQUES
        .choose(rng)
        .copied()
        .unwrap_or(Technique::SpoofData)
}

fn random_phase<R: Rng + ?Sized>(rng: &mut R) -> Phase {
    Phase::ALL.choose(rng).copied().unwrap_or(Phase::A)
}

/// Draw in-range parameters for `technique`.
pub fn random_request<R: Rng + ?Sized>(rng: &mut R, technique: Technique) -> AttackRequest {
    match technique {
        Technique::SpoofData => {
            let phase = random_phase(rng);
            let target = if rng.gen_bool(0.5) {
                SpoofTarget::voltage(phase)
            } else {
                SpoofTarget::power(phase)
            };
            let mut params = SpoofParams::new(target, Some(rng.gen_range(1000.0..3000.0)));
            params.phase_angle = Some(rng.gen_range(0.0..360.0));
            AttackRequest::SpoofData(params)
        }
        Technique::InjectLoad => AttackRequest::InjectLoad(InjectLoadParams {
            phase: random_phase(rng),
            magnitude: rng.gen_range(500_000.0..3_000_000.0),
            power_factor: rng.gen_range(0.7..0.95),
        }),
        Technique::BlockCommand => AttackRequest::BlockCommand(BlockCommandParams {
            enable: rng.gen_bool(0.5),
            duration: rng.gen_range(5.0..30.0),
        }),
        Technique::ToggleDevice => AttackRequest::ToggleDevice(ToggleDeviceParams {
            device: DEVICES.choose(rng).copied().unwrap_or("switch1").to_owned(),
            state: if rng.gen_bool(0.5) {
                DeviceState::Open
            } else {
                DeviceState::Closed
            },
        }),
        Technique::Reconnaissance => AttackRequest::Reconnaissance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_technique_never_picks_reconnaissance() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert_ne!(random_technique(&mut rng), Technique::Reconnaissance);
        }
    }

    #[test]
    fn random_parameters_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let technique = random_technique(&mut rng);
            match random_request(&mut rng, technique) {
                AttackRequest::SpoofData(p) => {
                    let value = p.value.expect("value");
                    assert!((1000.0..3000.0).contains(&value));
                    assert!((0.0..360.0).contains(&p.phase_angle.expect("angle")));
                }
                AttackRequest::InjectLoad(p) => {
                    assert!((5.0e5..3.0e6).contains(&p.magnitude));
                    assert!((0.7..0.95).contains(&p.power_factor));
                }
                AttackRequest::BlockCommand(p) => assert!((5.0..30.0).contains(&p.duration)),
                AttackRequest::ToggleDevice(p) => assert!(DEVICES.contains(&p.device.as_str())),
                AttackRequest::Reconnaissance => panic!("reconnaissance drawn"),
            }
        }
    }
}
