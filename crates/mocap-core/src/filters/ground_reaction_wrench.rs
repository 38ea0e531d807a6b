use crate::data_object::{AnyDataObject, DataObject};
use crate::error::{Error, Result};
use crate::geometry::{add, cross, normalize, scale, sub, Transform, Vector3};
use crate::log_error;
use crate::model::{ForcePlatform, ForcePlatformCollection, ForcePlatformType, Wrench, WrenchCollection};
use crate::process::{Algorithm, Inputs, Outputs, Ports};

/// Computes the ground reaction wrench of each force platform, expressed in
/// the global frame at the point of wrench application.
#[derive(Debug, Clone, Default)]
pub struct GroundReactionWrenchFilter {
    threshold: Option<f64>,
}

impl GroundReactionWrenchFilter {
    pub const NAME: &'static str = "GroundReactionWrenchFilter";

    pub fn new() -> Self {
        Self::default()
    }

    /// Vertical force below which (in absolute value) the point of
    /// application is reported as invalid. `None` disables the check.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: Option<f64>) {
        self.threshold = threshold;
    }
}

impl Algorithm for GroundReactionWrenchFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn input_ports(&self) -> Ports {
        Ports::Named(&["force platforms"])
    }

    fn make_outputs(&self) -> Vec<AnyDataObject> {
        vec![DataObject::new(WrenchCollection::new()).into()]
    }

    fn generate(&mut self, inputs: &Inputs, outputs: &mut Outputs<'_>) -> Result<()> {
        let platforms = inputs.required::<ForcePlatformCollection>(0)?;
        let wrenches = compute_wrenches(&platforms.borrow(), self.threshold)?;
        outputs.set(0, wrenches)
    }
}

/// Fails when the channels of a platform do not share one frame count.
pub fn compute_wrenches(
    platforms: &[ForcePlatform],
    threshold: Option<f64>,
) -> Result<WrenchCollection> {
    let mut wrenches = WrenchCollection::new();
    for (index, platform) in platforms.iter().enumerate() {
        let number = index + 1;
        let frames = platform.frame_number();
        if let Some(channel) = platform.channels.iter().find(|c| c.frame_number() != frames) {
            return Err(Error::process_object(format!(
                "{}: channel {} of force platform #{number} has {} frames instead of {frames}",
                GroundReactionWrenchFilter::NAME,
                channel.label,
                channel.frame_number()
            )));
        }
        if platform.channel_number() < platform.kind.channel_number() {
            log_error!(
                "Unexpected number of analog channels ({}) for force platform #{number}",
                platform.channel_number()
            );
            continue;
        }
        let mut wrench = Wrench::new(&format!("GRW{number}"), platform.frame_number());
        match platform.kind {
            ForcePlatformType::Type1 => fill_type1(&mut wrench, platform),
            ForcePlatformType::Type2 | ForcePlatformType::Type4 => {
                fill_six_components(&mut wrench, platform);
                let mut origin = platform.origin;
                if origin[2] > 0.0 {
                    log_error!(
                        "Origin for the force platform #{number} seems to be located from the center of the working surface instead of the inverse. Data are inverted to locate the center of the working surface from the platform's origin."
                    );
                    origin = scale(origin, -1.0);
                }
                finish(&mut wrench, origin, threshold);
            }
            ForcePlatformType::Type3 => {
                fill_kistler(&mut wrench, platform);
                let mut origin = [0.0, 0.0, platform.origin[2]];
                if origin[2] > 0.0 {
                    log_error!(
                        "Vertical offset between the origin of the force platform #{number} and the center of the working surface seems to be misconfigured (positive value). The opposite of this offset is used."
                    );
                    origin[2] = -origin[2];
                }
                finish(&mut wrench, origin, threshold);
            }
        }
        to_global(&mut wrench, &platform.corners);
        wrenches.push(wrench);
    }
    Ok(wrenches)
}

fn channel(platform: &ForcePlatform, index: usize, frame: usize) -> f64 {
    platform.channels[index].values()[frame]
}

fn fill_type1(wrench: &mut Wrench, platform: &ForcePlatform) {
    for frame in 0..wrench.frame_number() {
        let c = |i| channel(platform, i, frame);
        wrench.force.values_mut()[frame] = [c(0), c(1), c(2)];
        wrench.position.values_mut()[frame] = [c(3), c(4), 0.0];
        wrench.moment.values_mut()[frame] = [0.0, 0.0, c(5)];
    }
}

fn fill_six_components(wrench: &mut Wrench, platform: &ForcePlatform) {
    for frame in 0..wrench.frame_number() {
        let c = |i| channel(platform, i, frame);
        wrench.force.values_mut()[frame] = [c(0), c(1), c(2)];
        wrench.moment.values_mut()[frame] = [c(3), c(4), c(5)];
    }
}

fn fill_kistler(wrench: &mut Wrench, platform: &ForcePlatform) {
    let [ox, oy, _] = platform.origin;
    for frame in 0..wrench.frame_number() {
        let c = |i| channel(platform, i, frame);
        wrench.force.values_mut()[frame] = [c(0) + c(1), c(2) + c(3), c(4) + c(5) + c(6) + c(7)];
        wrench.moment.values_mut()[frame] = [
            oy * (c(4) + c(5) - c(6) - c(7)),
            ox * (c(5) + c(6) - c(4) - c(7)),
            oy * (c(1) - c(0)) + ox * (c(2) - c(3)),
        ];
    }
}

/// Transports the moment to the working surface and computes the point of
/// wrench application (Shimba, 1984).
fn finish(wrench: &mut Wrench, origin: Vector3, threshold: Option<f64>) {
    for frame in 0..wrench.frame_number() {
        let f = wrench.force.values()[frame];
        let [fx, fy, fz] = f;
        let m = add(wrench.moment.values()[frame], cross(f, origin));
        let [mx, my, mz] = m;
        let snf = fx * fx + fy * fy + fz * fz;

        let invalid = snf == 0.0
            || fz == 0.0
            || threshold.is_some_and(|threshold| fz.abs() <= threshold);
        let position = if invalid {
            wrench.position.residuals_mut()[frame] = -1.0;
            wrench.position.masks_mut()[frame] = -1.0;
            [0.0; 3]
        } else {
            [
                (fy * mz - fz * my) / snf - (fx * fx * my - fx * fy * mx) / (snf * fz),
                (fz * mx - fx * mz) / snf - (fx * fy * my - fy * fy * mx) / (snf * fz),
                0.0,
            ]
        };

        wrench.position.values_mut()[frame] = position;
        wrench.moment.values_mut()[frame] = add(m, cross(f, position));
    }
}

/// Rotation and centre of the working surface derived from its corners.
fn surface_frame(corners: &[[f64; 3]; 4]) -> Transform {
    let u = normalize(sub(corners[0], corners[1]));
    let w = normalize(cross(u, sub(corners[0], corners[3])));
    let v = cross(w, u);
    let o = scale(add(corners[0], corners[2]), 0.5);
    Transform::new(u, v, w, o)
}

fn to_global(wrench: &mut Wrench, corners: &[[f64; 3]; 4]) {
    let frame = surface_frame(corners);
    for i in 0..wrench.frame_number() {
        let force = frame.rotate(wrench.force.values()[i]);
        wrench.force.values_mut()[i] = force;
        let moment = frame.rotate(wrench.moment.values()[i]);
        wrench.moment.values_mut()[i] = moment;
        if wrench.position.is_valid(i) {
            let position = frame.apply(wrench.position.values()[i]);
            wrench.position.values_mut()[i] = position;
        }
    }
}
