use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::sample::TransformedSample;
use crate::error::ExportError;

/// One exported row, `{ "sample": n, "voltage": v }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
	pub sample: u64,
	pub voltage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
	Csv,
	Json,
	#[cfg(feature = "parquet")]
	Parquet,
}

impl RecordFormat {
	pub fn extension(self) -> &'static str {
		match self {
			RecordFormat::Csv => "csv",
			RecordFormat::Json => "json",
			#[cfg(feature = "parquet")]
			RecordFormat::Parquet => "parquet",
		}
	}
}

/// Collects forwarded samples between `start` and `stop`.
#[derive(Debug, Default)]
pub struct Recorder {
	rows: Option<Vec<RecordRow>>,
}

impl Recorder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_recording(&self) -> bool {
		self.rows.is_some()
	}

	/// Begin a fresh recording, discarding anything not yet stopped.
	pub fn start(&mut self) {
		self.rows = Some(Vec::new());
	}

	pub fn record(&mut self, sample: &TransformedSample) {
		if let Some(rows) = self.rows.as_mut() {
			rows.push(RecordRow { sample: sample.index, voltage: sample.value });
		}
	}

	/// Finish the recording. `None` when nothing was being recorded.
	pub fn stop(&mut self) -> Option<Recording> {
		self.rows.take().map(|rows| Recording { rows, stopped_at: Local::now() })
	}
}

#[derive(Debug, Clone)]
pub struct Recording {
	rows: Vec<RecordRow>,
	stopped_at: DateTime<Local>,
}

impl Recording {
	pub fn rows(&self) -> &[RecordRow] {
		&self.rows
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// `wavesense_voltage_data_DD-MM-YYYY_HH-MM-SS.<ext>`, stamped with the stop time.
	pub fn file_name(&self, format: RecordFormat) -> String {
		format!(
			"wavesense_voltage_data_{}.{}",
			self.stopped_at.format("%d-%m-%Y_%H-%M-%S"),
			format.extension()
		)
	}

	pub fn write_csv<W: Write>(&self, mut w: W) -> Result<(), ExportError> {
		writeln!(w, "sample,voltage")?;
		for r in &self.rows {
			writeln!(w, "{},{}", r.sample, r.voltage)?;
		}
		w.flush()?;
		Ok(())
	}

	pub fn write_json<W: Write>(&self, w: W) -> Result<(), ExportError> {
		serde_json::to_writer(w, &self.rows)?;
		Ok(())
	}

	#[cfg(feature = "parquet")]
	pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
		use arrow_array::{Float64Array, RecordBatch, UInt64Array};
		use arrow_schema::{DataType, Field, Schema};
		use parquet::arrow::arrow_writer::ArrowWriter;
		use parquet::file::properties::WriterProperties;
		use std::sync::Arc;

		let schema = Arc::new(Schema::new(vec![
			Field::new("sample", DataType::UInt64, false),
			Field::new("voltage", DataType::Float64, false),
		]));
		let batch = RecordBatch::try_new(
			schema.clone(),
			vec![
				Arc::new(UInt64Array::from_iter_values(self.rows.iter().map(|r| r.sample))) as _,
				Arc::new(Float64Array::from_iter_values(self.rows.iter().map(|r| r.voltage))) as _,
			],
		)?;
		let file = std::fs::File::create(path)?;
		let props = WriterProperties::builder().build();
		let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
		writer.write(&batch)?;
		writer.close()?;
		Ok(())
	}

	/// Write into `dir` under [`Recording::file_name`] and return the full path.
	pub fn save_in<P: AsRef<Path>>(&self, dir: P, format: RecordFormat) -> Result<PathBuf, ExportError> {
		std::fs::create_dir_all(dir.as_ref())?;
		let path = dir.as_ref().join(self.file_name(format));
		match format {
			RecordFormat::Csv => self.write_csv(std::io::BufWriter::new(std::fs::File::create(&path)?))?,
			RecordFormat::Json => self.write_json(std::io::BufWriter::new(std::fs::File::create(&path)?))?,
			#[cfg(feature = "parquet")]
			RecordFormat::Parquet => self.write_parquet(&path)?,
		}
		Ok(path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ts(index: u64, value: f64) -> TransformedSample {
		TransformedSample { index, raw: value, value }
	}

	#[test]
	fn records_only_between_start_and_stop() {
		let mut rec = Recorder::new();
		rec.record(&ts(0, 1.0));
		assert!(rec.stop().is_none());
		rec.start();
		rec.record(&ts(4, 0.25));
		rec.record(&ts(8, -0.5));
		let r = rec.stop().unwrap();
		assert!(!rec.is_recording());
		assert_eq!(r.rows(), &[RecordRow { sample: 4, voltage: 0.25 }, RecordRow { sample: 8, voltage: -0.5 }]);
	}

	#[test]
	fn csv_has_header_and_rows() {
		let mut rec = Recorder::new();
		rec.start();
		rec.record(&ts(1, 0.5));
		rec.record(&ts(2, -1.0));
		let mut out = Vec::new();
		rec.stop().unwrap().write_csv(&mut out).unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "sample,voltage\n1,0.5\n2,-1\n");
	}

	#[test]
	fn json_is_array_of_sample_voltage() {
		let mut rec = Recorder::new();
		rec.start();
		rec.record(&ts(3, 0.125));
		let mut out = Vec::new();
		rec.stop().unwrap().write_json(&mut out).unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), r#"[{"sample":3,"voltage":0.125}]"#);
	}

	#[test]
	fn file_name_shape() {
		let mut rec = Recorder::new();
		rec.start();
		let name = rec.stop().unwrap().file_name(RecordFormat::Csv);
		assert!(name.starts_with("wavesense_voltage_data_"));
		assert!(name.ends_with(".csv"));
		// DD-MM-YYYY_HH-MM-SS
		let stamp = &name["wavesense_voltage_data_".len()..name.len() - 4];
		assert_eq!(stamp.len(), 19);
		assert!(!stamp.contains(':'));
	}
}
