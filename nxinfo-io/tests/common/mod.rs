//! HDF5 master-file fixtures written into a temporary directory.
#![allow(dead_code)]

use hdf5::types::{FixedAscii, FixedUnicode, VarLenUnicode};
use hdf5::{File, Group, Location};
use ndarray::ArrayView1;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;

pub const DETECTOR: &str = "/entry/instrument/detector";
pub const DETECTOR_SPECIFIC: &str = "/entry/instrument/detector/detectorSpecific";
pub const GONIOMETER: &str = "/entry/sample/goniometer";

/// A master file under construction.
pub struct MasterFile {
    dir: TempDir,
    path: PathBuf,
    file: File,
}

/// A finished fixture; the directory lives as long as this value.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn split(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn write_attr_str(location: &Location, name: &str, value: &str) {
    let value = VarLenUnicode::from_str(value).unwrap();
    location
        .new_attr::<VarLenUnicode>()
        .create(name)
        .unwrap()
        .write_scalar(&value)
        .unwrap();
}

fn write_vector(location: &Location, vector: [f64; 3]) {
    location
        .new_attr::<f64>()
        .shape((3,))
        .create("vector")
        .unwrap()
        .write(ArrayView1::from(&vector[..]))
        .unwrap();
}

impl MasterFile {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_01_master.h5");
        let file = File::create(&path).unwrap();
        Self { dir, path, file }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Opens a group, creating every missing component.
    pub fn group(&self, path: &str) -> Group {
        let mut group: Group = self.file.group("/").unwrap();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            group = if group.link_exists(part) {
                group.group(part).unwrap()
            } else {
                group.create_group(part).unwrap()
            };
        }
        group
    }

    pub fn f64s(&self, path: &str, values: &[f64], units: Option<&str>) -> &Self {
        let (parent, name) = split(path);
        let dataset = self
            .group(parent)
            .new_dataset::<f64>()
            .shape((values.len(),))
            .create(name)
            .unwrap();
        dataset.write(ArrayView1::from(values)).unwrap();
        if let Some(units) = units {
            write_attr_str(&dataset, "units", units);
        }
        self
    }

    pub fn f64(&self, path: &str, value: f64, units: &str) -> &Self {
        self.f64s(path, &[value], Some(units))
    }

    pub fn i64(&self, path: &str, value: i64) -> &Self {
        let (parent, name) = split(path);
        let dataset = self
            .group(parent)
            .new_dataset::<i64>()
            .shape((1,))
            .create(name)
            .unwrap();
        dataset.write(ArrayView1::from(&[value][..])).unwrap();
        self
    }

    pub fn u32s(&self, path: &str, values: &[u32]) -> &Self {
        let (parent, name) = split(path);
        let dataset = self
            .group(parent)
            .new_dataset::<u32>()
            .shape((values.len(),))
            .create(name)
            .unwrap();
        dataset.write(ArrayView1::from(values)).unwrap();
        self
    }

    pub fn string(&self, path: &str, value: &str) -> &Self {
        let (parent, name) = split(path);
        let value = VarLenUnicode::from_str(value).unwrap();
        let dataset = self
            .group(parent)
            .new_dataset::<VarLenUnicode>()
            .shape((1,))
            .create(name)
            .unwrap();
        dataset.write(ArrayView1::from(&[value][..])).unwrap();
        self
    }

    /// Writes a fixed-length ASCII string; `raw` may carry NULs and padding.
    pub fn fixed_ascii(&self, path: &str, raw: &[u8]) -> &Self {
        let (parent, name) = split(path);
        let value = FixedAscii::<32>::from_ascii(raw).unwrap();
        let dataset = self
            .group(parent)
            .new_dataset::<FixedAscii<32>>()
            .shape((1,))
            .create(name)
            .unwrap();
        dataset.write(ArrayView1::from(&[value][..])).unwrap();
        self
    }

    /// Writes a fixed-length UTF-8 string.
    pub fn fixed_unicode(&self, path: &str, value: &str) -> &Self {
        let (parent, name) = split(path);
        let value = FixedUnicode::<16>::from_str(value).unwrap();
        let dataset = self
            .group(parent)
            .new_dataset::<FixedUnicode<16>>()
            .shape((1,))
            .create(name)
            .unwrap();
        dataset.write(ArrayView1::from(&[value][..])).unwrap();
        self
    }

    /// Adds a string attribute to an existing group.
    pub fn group_attr(&self, path: &str, name: &str, value: &str) -> &Self {
        write_attr_str(&self.group(path), name, value);
        self
    }

    /// Adds a `vector` attribute to a group or an existing dataset.
    pub fn vector(&self, path: &str, vector: [f64; 3], on_dataset: bool) -> &Self {
        if on_dataset {
            write_vector(&self.file.dataset(path).unwrap(), vector);
        } else {
            write_vector(&self.group(path), vector);
        }
        self
    }

    /// Writes a data file next to the master and links it as
    /// `/entry/data/<link>`.
    pub fn data_file(&self, link: &str, images: usize, numbers: Option<(i64, i64)>) -> &Self {
        self.write_data_file(link, images, numbers, false)
    }

    /// Like [`MasterFile::data_file`] with shuffle and deflate applied.
    pub fn compressed_data_file(&self, link: &str, images: usize) -> &Self {
        self.write_data_file(link, images, None, true)
    }

    fn write_data_file(
        &self,
        link: &str,
        images: usize,
        numbers: Option<(i64, i64)>,
        compressed: bool,
    ) -> &Self {
        let file_name = format!("run_01_{link}.h5");
        {
            let data = File::create(self.dir().join(&file_name)).unwrap();
            let builder = data.new_dataset::<u16>().shape((images, 2, 2));
            let builder = if compressed {
                builder.chunk((1, 2, 2)).shuffle().deflate(4)
            } else {
                builder
            };
            let dataset = builder.create("data").unwrap();
            if let Some((low, high)) = numbers {
                for (name, value) in [("image_nr_low", low), ("image_nr_high", high)] {
                    dataset
                        .new_attr::<i64>()
                        .create(name)
                        .unwrap()
                        .write_scalar(&value)
                        .unwrap();
                }
            }
        }
        self.dangling_link(link, &file_name)
    }

    /// Links `/entry/data/<link>` to a file that may not exist.
    pub fn dangling_link(&self, link: &str, file_name: &str) -> &Self {
        self.group("/entry/data")
            .link_external(file_name, "/data", link)
            .unwrap();
        self
    }

    /// Minimal primary-schema detector geometry.
    pub fn detector_geometry(&self) -> &Self {
        self.f64(&format!("{DETECTOR}/detector_distance"), 0.15, "m")
            .f64("/entry/instrument/beam/incident_wavelength", 0.9763, "angstrom")
            .f64(&format!("{DETECTOR}/x_pixel_size"), 75e-6, "m")
            .f64(&format!("{DETECTOR}/y_pixel_size"), 75e-6, "m")
            .u32s(&format!("{DETECTOR_SPECIFIC}/x_pixels_in_detector"), &[4150])
            .u32s(&format!("{DETECTOR_SPECIFIC}/y_pixels_in_detector"), &[4371])
            .f64(&format!("{DETECTOR}/beam_center_x"), 2075.5, "pixel")
            .f64(&format!("{DETECTOR}/beam_center_y"), 2200.25, "pixel")
    }

    pub fn counts(&self, nimages: i64, ntrigger: i64) -> &Self {
        self.i64(&format!("{DETECTOR_SPECIFIC}/nimages"), nimages)
            .i64(&format!("{DETECTOR_SPECIFIC}/ntrigger"), ntrigger)
    }

    pub fn finish(self) -> Fixture {
        let Self { dir, path, file } = self;
        drop(file);
        Fixture { _dir: dir, path }
    }
}
