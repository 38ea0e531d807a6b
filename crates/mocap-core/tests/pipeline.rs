use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;
use mocap_core::{
    Algorithm, AnyDataObject, DataObject, ErrorKind, Inputs, Outputs, Ports, ProcessObject,
};

/// Multiplies every sample of its input and counts its runs.
struct Gain {
    factor: f64,
    runs: Rc<Cell<usize>>,
}

impl Gain {
    fn new(factor: f64) -> (Self, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        (
            Self {
                factor,
                runs: Rc::clone(&runs),
            },
            runs,
        )
    }
}

impl Algorithm for Gain {
    fn name(&self) -> &'static str {
        "Gain"
    }

    fn input_ports(&self) -> Ports {
        Ports::Named(&["samples"])
    }

    fn make_outputs(&self) -> Vec<AnyDataObject> {
        vec![DataObject::new(Vec::<f64>::new()).into()]
    }

    fn generate(&mut self, inputs: &Inputs, outputs: &mut Outputs<'_>) -> mocap_core::Result<()> {
        self.runs.set(self.runs.get() + 1);
        let samples = inputs.required::<Vec<f64>>(0)?;
        let scaled: Vec<f64> = samples.borrow().iter().map(|v| v * self.factor).collect();
        outputs.set(0, scaled)
    }
}

/// Sums any number of scalar inputs.
struct Sum;

impl Algorithm for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn input_ports(&self) -> Ports {
        Ports::Variadic("term")
    }

    fn make_outputs(&self) -> Vec<AnyDataObject> {
        vec![DataObject::new(0.0_f64).into()]
    }

    fn generate(&mut self, inputs: &Inputs, outputs: &mut Outputs<'_>) -> mocap_core::Result<()> {
        let total = inputs
            .all::<f64>()?
            .iter()
            .map(|term| *term.borrow())
            .sum::<f64>();
        outputs.set(0, total)
    }
}

/// Produces two outputs but can be told to fail half-way.
struct Split {
    fail: bool,
    stage_both: bool,
}

impl Algorithm for Split {
    fn name(&self) -> &'static str {
        "Split"
    }

    fn input_ports(&self) -> Ports {
        Ports::Named(&["value"])
    }

    fn make_outputs(&self) -> Vec<AnyDataObject> {
        vec![
            DataObject::new(0_i32).into(),
            DataObject::new(0_i32).into(),
        ]
    }

    fn generate(&mut self, inputs: &Inputs, outputs: &mut Outputs<'_>) -> mocap_core::Result<()> {
        let value = *inputs.required::<i32>(0)?.borrow();
        outputs.set(0, value)?;
        if self.fail {
            return Err(mocap_core::Error::process_object("dimension mismatch"));
        }
        if self.stage_both {
            outputs.set(1, -value)?;
        }
        Ok(())
    }
}

#[test]
fn second_update_does_not_recompute() -> Result<()> {
    let source = DataObject::new(vec![1.0, 2.0, 3.0]);
    let (gain, runs) = Gain::new(2.0);
    let node = ProcessObject::new(gain);
    node.set_input(0, source.clone())?;

    let output = node.output::<Vec<f64>>(0)?;
    let before = output.timestamp();
    assert!(output.borrow().is_empty(), "output() must not compute");

    node.update()?;
    let first = output.timestamp();
    assert!(first > before);
    assert_eq!(*output.borrow(), vec![2.0, 4.0, 6.0]);

    node.update()?;
    assert_eq!(output.timestamp(), first);
    assert_eq!(runs.get(), 1);

    source.modify(|samples| samples.push(4.0));
    node.update()?;
    assert!(output.timestamp() > first);
    assert_eq!(output.borrow().len(), 4);
    assert_eq!(runs.get(), 2);
    Ok(())
}

#[test]
fn chained_nodes_update_depth_first() -> Result<()> {
    let source = DataObject::new(vec![1.0]);
    let (first, first_runs) = Gain::new(10.0);
    let (second, second_runs) = Gain::new(3.0);
    let upstream = ProcessObject::new(first);
    let downstream = ProcessObject::new(second);
    upstream.set_input(0, source.clone())?;
    downstream.set_input(0, upstream.output_port(0))?;

    downstream.update()?;
    assert_eq!(*downstream.output::<Vec<f64>>(0)?.borrow(), vec![30.0]);
    assert_eq!((first_runs.get(), second_runs.get()), (1, 1));

    downstream.update()?;
    assert_eq!((first_runs.get(), second_runs.get()), (1, 1));

    let stamp = downstream.output::<Vec<f64>>(0)?.timestamp();
    source.replace(vec![2.0]);
    downstream.update()?;
    assert_eq!(*downstream.output::<Vec<f64>>(0)?.borrow(), vec![60.0]);
    assert!(downstream.output::<Vec<f64>>(0)?.timestamp() > stamp);
    assert_eq!((first_runs.get(), second_runs.get()), (2, 2));
    Ok(())
}

#[test]
fn configuration_changes_trigger_recomputation() -> Result<()> {
    let (gain, runs) = Gain::new(1.0);
    let node = ProcessObject::new(gain);
    node.set_input(0, DataObject::new(vec![5.0]))?;
    node.update()?;
    node.configure(|gain| gain.factor = 4.0);
    node.update()?;
    assert_eq!(runs.get(), 2);
    assert_eq!(*node.output::<Vec<f64>>(0)?.borrow(), vec![20.0]);
    assert_eq!(node.with_algorithm(|gain| gain.factor), 4.0);
    Ok(())
}

#[test]
fn consumers_share_the_same_output_object() -> Result<()> {
    let (gain, _) = Gain::new(1.0);
    let node = ProcessObject::new(gain);
    node.set_input(0, DataObject::new(vec![1.0]))?;
    let a = node.output::<Vec<f64>>(0)?;
    let b = node.output::<Vec<f64>>(0)?;
    node.update()?;
    assert!(a.ptr_eq(&b));
    assert!(a.holders() >= 3);
    Ok(())
}

#[test]
fn cycles_are_rejected_when_connecting() -> Result<()> {
    let (a, _) = Gain::new(1.0);
    let (b, _) = Gain::new(1.0);
    let a = ProcessObject::new(a);
    let b = ProcessObject::new(b);
    b.set_input(0, a.output_port(0))?;

    let err = a.set_input(0, b.output_port(0)).unwrap_err();
    assert!(err.is(ErrorKind::ProcessObject));
    assert!(err.what().contains("cycle"));

    let err = a.set_input(0, a.output_port(0)).unwrap_err();
    assert!(err.is(ErrorKind::ProcessObject));

    let own_output = a.output::<Vec<f64>>(0)?;
    assert!(a.set_input(0, own_output).is_err());
    Ok(())
}

#[test]
fn undeclared_ports_are_rejected() {
    let (gain, _) = Gain::new(1.0);
    let node = ProcessObject::new(gain);
    let err = node.set_input(1, DataObject::new(vec![1.0])).unwrap_err();
    assert!(err.is_logic_error());

    let (other, _) = Gain::new(1.0);
    let other = ProcessObject::new(other);
    assert!(node.set_input(0, other.output_port(4)).is_err());
}

#[test]
fn missing_or_mistyped_inputs_fail_the_update() -> Result<()> {
    let (gain, runs) = Gain::new(1.0);
    let node = ProcessObject::new(gain);
    let err = node.update().unwrap_err();
    assert!(err.is(ErrorKind::ProcessObject));
    assert_eq!(runs.get(), 1);

    node.set_input(0, DataObject::new(String::from("not samples")))?;
    let err = node.update().unwrap_err();
    assert!(err.is(ErrorKind::ProcessObject));
    assert!(node.last_computed().is_none());
    Ok(())
}

#[test]
fn failed_transforms_publish_nothing() -> Result<()> {
    let input = DataObject::new(7_i32);
    let node = ProcessObject::new(Split {
        fail: true,
        stage_both: true,
    });
    node.set_input(0, input.clone())?;
    let first = node.output::<i32>(0)?;
    let stamp = first.timestamp();

    assert!(node.update().is_err());
    assert_eq!(first.timestamp(), stamp);
    assert_eq!(*first.borrow(), 0);

    node.configure(|split| {
        split.fail = false;
        split.stage_both = false;
    });
    let err = node.update().unwrap_err();
    assert!(err.what().contains("output #1"));
    assert_eq!(first.timestamp(), stamp);

    node.configure(|split| split.stage_both = true);
    node.update()?;
    assert_eq!(*node.output::<i32>(0)?.borrow(), 7);
    assert_eq!(*node.output::<i32>(1)?.borrow(), -7);
    Ok(())
}

#[test]
fn variadic_ports_accept_any_number_of_inputs() -> Result<()> {
    let sum = ProcessObject::new(Sum);
    let terms: Vec<DataObject<f64>> = (1..=4).map(|v| DataObject::new(f64::from(v))).collect();
    for (port, term) in terms.iter().enumerate() {
        sum.set_input(port, term.clone())?;
    }
    sum.update()?;
    assert_eq!(*sum.output::<f64>(0)?.borrow(), 10.0);

    sum.clear_input(0);
    sum.update()?;
    assert_eq!(*sum.output::<f64>(0)?.borrow(), 9.0);
    assert!(sum.output::<i32>(0).is_err());
    Ok(())
}
