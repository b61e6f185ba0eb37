use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use tumor_core::cfg::{PropertySet, ReportConfig, SimConfig};
use tumor_core::io::output::{
    BulkVafSummaryReport, CellCountTrajReport, ComponentAncestryReport, GrowthCountReport,
};
use tumor_core::io::Report;
use tumor_core::sim::TrialHandler;

/// A writer handing its bytes back to the test after the report is done
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }

    fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn sim_config(overrides: &[(&str, &str)]) -> SimConfig {
    let mut props = PropertySet::new();
    props.set("tumor.driver.componentType", "CELL");
    props.set("tumor.driver.spatialType", "POINT");
    props.set("tumor.driver.initialSize", "10");
    props.set("tumor.driver.maxStepCount", "1");
    props.set("tumor.driver.maxTumorSize", "10");
    props.set("tumor.driver.randomSeed", "20260801");
    props.set("tumor.growth.birthRate", "0");
    props.set("tumor.growth.deathRate", "0");

    for (key, value) in overrides {
        props.set(key, value);
    }

    SimConfig::from_properties(&props).expect("test configuration must validate")
}

/// Drive a full trial through a set of reports
fn run_with_reports(cfg: SimConfig, reports: &mut [&mut dyn Report]) {
    let mut handler = TrialHandler::new(cfg).expect("founders must seed");

    for report in reports.iter_mut() {
        report.initialize_trial(&mut handler.step_context()).unwrap();
    }
    loop {
        handler.step();
        for report in reports.iter_mut() {
            report.process_step(&mut handler.step_context()).unwrap();
        }
        if !handler.should_continue() {
            break;
        }
    }
    for report in reports.iter_mut() {
        report.finalize_trial(&mut handler.step_context()).unwrap();
    }
}

#[test]
fn a_trivial_trial_writes_one_trajectory_row() {
    let buf = SharedBuf::default();
    let mut report =
        CellCountTrajReport::new(Box::new(buf.clone()), &enabled_report()).unwrap();

    run_with_reports(sim_config(&[]), &mut [&mut report]);

    assert_eq!(
        buf.lines(),
        vec![
            "trialIndex,timeStep,cellCount,componentCount".to_string(),
            "0,1,10,10".to_string(),
        ]
    );
}

#[test]
fn growth_counts_stay_zero_without_events() {
    let buf = SharedBuf::default();
    let mut report = GrowthCountReport::new(Box::new(buf.clone()), &enabled_report()).unwrap();

    run_with_reports(sim_config(&[]), &mut [&mut report]);

    assert_eq!(
        buf.lines(),
        vec![
            "trialIndex,timeStep,cellCount,birthCount,deathCount".to_string(),
            "0,1,10,0,0".to_string(),
        ]
    );
}

#[test]
fn sampling_intervals_gate_trajectory_rows() {
    let buf = SharedBuf::default();
    let cfg_entry = ReportConfig {
        run: true,
        sample_interval: 2,
        ..ReportConfig::default()
    };
    let mut report = CellCountTrajReport::new(Box::new(buf.clone()), &cfg_entry).unwrap();

    run_with_reports(
        sim_config(&[
            ("tumor.driver.maxStepCount", "5"),
            ("tumor.driver.maxTumorSize", "100"),
        ]),
        &mut [&mut report],
    );

    // Steps 2 and 4 sample; 1, 3, and 5 do not.
    let lines = buf.lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("0,2,"));
    assert!(lines[2].starts_with("0,4,"));
}

#[test]
fn ancestry_rows_cover_every_founder() {
    let buf = SharedBuf::default();
    let mut report = ComponentAncestryReport::new(Box::new(buf.clone())).unwrap();

    run_with_reports(sim_config(&[]), &mut [&mut report]);

    let lines = buf.lines();
    assert_eq!(lines[0], "trialIndex;componentIndex;parentIndex");
    assert_eq!(lines.len(), 11);
    // Founders descend from the virtual root, index zero.
    for (offset, line) in lines[1..].iter().enumerate() {
        assert_eq!(*line, format!("0;{};0", offset + 1));
    }
}

#[test]
fn vaf_summary_rows_appear_even_without_mutations() {
    let buf = SharedBuf::default();
    let mut report =
        BulkVafSummaryReport::new(Box::new(buf.clone()), &enabled_report()).unwrap();

    run_with_reports(sim_config(&[]), &mut [&mut report]);

    let lines = buf.lines();
    assert!(lines[0].starts_with("trialIndex,timeStep,sampleIndex"));
    // The point tumor yields one sample row with zero frequencies.
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("0,1,0,"));

    let fields: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(fields.len(), 15);
    assert_eq!(fields[6], "10"); // sampleCellCount
    assert_eq!(fields[7], "0"); // distinctCount
    assert_eq!(fields[8], "0"); // clonalCount
    for freq in &fields[9..] {
        assert_eq!(freq.parse::<f64>().unwrap(), 0.0);
    }
}

fn enabled_report() -> ReportConfig {
    ReportConfig {
        run: true,
        ..ReportConfig::default()
    }
}
