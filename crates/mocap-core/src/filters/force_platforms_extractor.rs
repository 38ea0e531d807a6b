use crate::data_object::{AnyDataObject, DataObject};
use crate::error::Result;
use crate::model::{
    Acquisition, Analog, ForcePlatform, ForcePlatformCollection, ForcePlatformType, MetaData,
    MetaDataInfo,
};
use crate::process::{Algorithm, Inputs, Outputs, Ports};
use crate::log_error;

/// Builds one [`ForcePlatform`] per entry of the `FORCE_PLATFORM` metadata
/// group, copying (and for type 4, calibrating) the analog channels it lists.
#[derive(Debug, Clone, Default)]
pub struct ForcePlatformsExtractor;

impl ForcePlatformsExtractor {
    pub const NAME: &'static str = "ForcePlatformsExtractor";

    pub fn new() -> Self {
        Self
    }
}

impl Algorithm for ForcePlatformsExtractor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn input_ports(&self) -> Ports {
        Ports::Named(&["acquisition"])
    }

    fn make_outputs(&self) -> Vec<AnyDataObject> {
        vec![DataObject::new(ForcePlatformCollection::new()).into()]
    }

    fn generate(&mut self, inputs: &Inputs, outputs: &mut Outputs<'_>) -> Result<()> {
        let acquisition = inputs.required::<Acquisition>(0)?;
        let platforms = extract_force_platforms(&acquisition.borrow());
        outputs.set(0, platforms)
    }
}

fn entry<'a>(group: &'a MetaData, label: &str) -> Option<&'a MetaDataInfo> {
    group.child(label).and_then(MetaData::info)
}

pub fn extract_force_platforms(acquisition: &Acquisition) -> ForcePlatformCollection {
    let mut platforms = ForcePlatformCollection::new();
    let Some(group) = acquisition.metadata().child("FORCE_PLATFORM") else {
        return platforms;
    };

    let mut used = entry(group, "USED")
        .and_then(MetaDataInfo::first_i32)
        .unwrap_or(0)
        .max(0) as usize;
    let types = match entry(group, "TYPE") {
        Some(info) => {
            let types = info.to_i32s();
            if types.len() < used {
                log_error!(
                    "FORCE_PLATFORM:USED and FORCE_PLATFORM:TYPE don't indicate the same number of force platforms. The lower is kept: FORCE_PLATFORM:TYPE"
                );
                used = types.len();
            } else if types.len() > used {
                log_error!(
                    "FORCE_PLATFORM:USED and FORCE_PLATFORM:TYPE don't indicate the same number of force platforms. The lower is kept: FORCE_PLATFORM:USED"
                );
            }
            types
        }
        None => vec![1; used],
    };

    let Some(channels) = entry(group, "CHANNEL") else {
        log_error!(
            "No FORCE_PLATFORM:CHANNEL entry. Impossible to extract analog channels associated with the force platform(s)."
        );
        return platforms;
    };
    let channel_indices = channels.to_i32s();

    let origins = entry(group, "ORIGIN").map(MetaDataInfo::to_f64s);
    if origins.is_none() {
        log_error!("No FORCE_PLATFORM:ORIGIN entry. Default values are used.");
    }
    let corners = entry(group, "CORNERS").map(MetaDataInfo::to_f64s);
    if corners.is_none() {
        log_error!("No FORCE_PLATFORM:CORNERS entry. Default values are used.");
    }
    let calibrations = entry(group, "CAL_MATRIX").map(MetaDataInfo::to_f64s);

    let mut channels_extracted = 0;
    let mut coefficients_extracted = 0;
    for (index, code) in types.iter().take(used).enumerate() {
        let Some(kind) = ForcePlatformType::from_code(*code) else {
            log_error!(
                "Force platform type {code} is not supported. Platform #{} is skipped.",
                index + 1
            );
            continue;
        };

        let mut platform = ForcePlatform::new(kind);
        let n = kind.channel_number();
        if let Some(origins) = &origins {
            if let Some(values) = origins.get(3 * index..3 * index + 3) {
                platform.origin = [values[0], values[1], values[2]];
            }
        }
        if let Some(corners) = &corners {
            if let Some(values) = corners.get(12 * index..12 * index + 12) {
                for (corner, chunk) in platform.corners.iter_mut().zip(values.chunks(3)) {
                    corner.copy_from_slice(chunk);
                }
            }
        }
        match &calibrations {
            Some(values) => {
                if let Some(column_major) =
                    values.get(coefficients_extracted..coefficients_extracted + n * n)
                {
                    let mut row_major = vec![0.0; n * n];
                    for col in 0..n {
                        for row in 0..n {
                            row_major[row * n + col] = column_major[row + col * n];
                        }
                    }
                    platform.calibration = Some(row_major);
                }
                coefficients_extracted += n * n;
            }
            None if kind.requires_calibration() => {
                log_error!(
                    "No calibration matrix for force platform #{}. Its data won't be scaled.",
                    index + 1
                );
            }
            None => {}
        }

        let indices = channel_indices.get(channels_extracted..channels_extracted + n);
        let analogs = acquisition.analogs();
        let resolved: Option<Vec<&Analog>> = indices.and_then(|indices| {
            indices
                .iter()
                .map(|i| {
                    usize::try_from(*i)
                        .ok()
                        .and_then(|i| i.checked_sub(1))
                        .and_then(|i| analogs.get(i))
                })
                .collect()
        });
        channels_extracted += n;

        platform.channels = match resolved {
            Some(sources) => copy_channels(&sources, platform.calibration.as_deref(), kind),
            None => {
                log_error!(
                    "Error(s) occurred during channel extraction for force platform #{}. Replacement by vector of zeros.",
                    index + 1
                );
                (0..n)
                    .map(|c| {
                        Analog::new(
                            format!("FP{}C{}", index + 1, c + 1),
                            acquisition.analog_frame_number(),
                        )
                    })
                    .collect()
            }
        };
        platforms.push(platform);
    }
    platforms
}

/// Copies the source channels. Type 4 platforms get `raw * calibrationᵀ`.
fn copy_channels(
    sources: &[&Analog],
    calibration: Option<&[f64]>,
    kind: ForcePlatformType,
) -> Vec<Analog> {
    let mut channels: Vec<Analog> = sources.iter().map(|a| (*a).clone()).collect();
    let Some(cal) = calibration.filter(|_| kind.requires_calibration()) else {
        return channels;
    };
    let n = sources.len();
    let frames = sources.first().map(|a| a.frame_number()).unwrap_or(0);
    for (row, channel) in channels.iter_mut().enumerate() {
        let values = channel.values_mut();
        for (frame, value) in values.iter_mut().enumerate().take(frames) {
            *value = (0..n)
                .map(|col| cal[row * n + col] * sources[col].values().get(frame).copied().unwrap_or(0.0))
                .sum();
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn acquisition_with_platforms(channels: Vec<i16>, types: Vec<i16>) -> Acquisition {
        let mut acq = Acquisition::new();
        acq.init(0, 4, 12, 1).unwrap();
        for (i, analog) in acq.analogs_mut().iter_mut().enumerate() {
            analog.label = format!("A{}", i + 1);
            for (frame, value) in analog.values_mut().iter_mut().enumerate() {
                *value = (i * 10 + frame) as f64;
            }
        }
        let md = acq.metadata_mut();
        md.set_info("FORCE_PLATFORM.USED", MetaDataInfo::int16(types.len() as i16))
            .unwrap();
        md.set_info("FORCE_PLATFORM.TYPE", MetaDataInfo::int16s(types))
            .unwrap();
        md.set_info("FORCE_PLATFORM.CHANNEL", MetaDataInfo::int16s(channels))
            .unwrap();
        acq
    }

    #[test]
    fn channels_are_selected_by_one_based_index() {
        let acq = acquisition_with_platforms((1..=12).rev().collect(), vec![2, 2]);
        let platforms = extract_force_platforms(&acq);
        assert_eq!(platforms.len(), 2);
        assert_eq!(platforms[0].channels[0].label, "A12");
        assert_eq!(platforms[1].channels[5].label, "A1");
        assert_eq!(platforms[0].corners, crate::model::DEFAULT_CORNERS);
        assert_eq!(platforms[0].frame_number(), 4);
    }

    #[test]
    fn bad_indices_produce_zero_channels() {
        let acq = acquisition_with_platforms(vec![1, 2, 3, 4, 5, 40], vec![2]);
        let platforms = extract_force_platforms(&acq);
        assert_eq!(platforms.len(), 1);
        let labels: Vec<&str> = platforms[0].channels.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["FP1C1", "FP1C2", "FP1C3", "FP1C4", "FP1C5", "FP1C6"]);
        assert!(platforms[0].channels[0].values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn missing_channel_entry_yields_no_platform() {
        let mut acq = acquisition_with_platforms(vec![1, 2, 3, 4, 5, 6], vec![2]);
        acq.metadata_mut()
            .find_mut("FORCE_PLATFORM")
            .unwrap()
            .remove_child("CHANNEL");
        assert!(extract_force_platforms(&acq).is_empty());
    }

    #[test]
    fn type_count_limits_used_platforms() {
        let mut acq = acquisition_with_platforms((1..=12).collect(), vec![2]);
        acq.metadata_mut()
            .set_info("FORCE_PLATFORM.USED", MetaDataInfo::int16(2))
            .unwrap();
        assert_eq!(extract_force_platforms(&acq).len(), 1);
    }

    #[test]
    fn type4_channels_are_calibrated() {
        let mut acq = acquisition_with_platforms(vec![1, 2, 3, 4, 5, 6], vec![4]);
        // Column-major 6x6 diagonal with 2 on the diagonal plus cal(0, 1) = 1.
        let mut cal = vec![0.0; 36];
        for i in 0..6 {
            cal[i + i * 6] = 2.0;
        }
        cal[6] = 1.0;
        acq.metadata_mut()
            .set_info("FORCE_PLATFORM.CAL_MATRIX", MetaDataInfo::floats(cal))
            .unwrap();

        let platforms = extract_force_platforms(&acq);
        let channels = &platforms[0].channels;
        // Frame 1: A1 = 1, A2 = 11.
        assert_relative_eq!(channels[0].values()[1], 2.0 * 1.0 + 11.0);
        assert_relative_eq!(channels[1].values()[1], 2.0 * 11.0);
        assert_eq!(channels[0].label, "A1");
    }

    #[test]
    fn origins_and_corners_are_read_per_platform() {
        let mut acq = acquisition_with_platforms((1..=12).collect(), vec![2, 2]);
        let md = acq.metadata_mut();
        md.set_info(
            "FORCE_PLATFORM.ORIGIN",
            MetaDataInfo::floats(vec![1.0, 2.0, -30.0, 4.0, 5.0, -60.0]),
        )
        .unwrap();
        md.set_info(
            "FORCE_PLATFORM.CORNERS",
            MetaDataInfo::floats((0..24).map(f64::from).collect()),
        )
        .unwrap();

        let platforms = extract_force_platforms(&acq);
        assert_eq!(platforms[1].origin, [4.0, 5.0, -60.0]);
        assert_eq!(platforms[1].corners[0], [12.0, 13.0, 14.0]);
        assert_eq!(platforms[0].corners[3], [9.0, 10.0, 11.0]);
    }
}
