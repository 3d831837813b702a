use wr_config::AggregateKind;

use super::AggregateOp;
use crate::result::Payload;

/// Running statistics shared by every built-in numeric aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericAcc {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for NumericAcc {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

/// Built-in aggregate over `f64` event values.
///
/// `Count` produces [`Payload::Long`], every other kind [`Payload::Double`].
/// `Min`, `Max` and `Avg` have no value for an empty window and fail in
/// [`finish`](AggregateOp::finish).
#[derive(Debug, Clone, Copy)]
pub struct NumericAggregate {
    kind: AggregateKind,
}

impl NumericAggregate {
    pub fn new(kind: AggregateKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }
}

impl AggregateOp for NumericAggregate {
    type Event = f64;
    type Acc = NumericAcc;
    type Output = Payload;

    fn init(&self) -> NumericAcc {
        NumericAcc::default()
    }

    fn accumulate(&self, acc: &mut NumericAcc, event: &f64) -> anyhow::Result<()> {
        let v = *event;
        if !v.is_finite() {
            anyhow::bail!("non-finite event value {v}");
        }
        acc.count += 1;
        acc.sum += v;
        acc.min = acc.min.min(v);
        acc.max = acc.max.max(v);
        Ok(())
    }

    fn combine(&self, acc: &mut NumericAcc, other: NumericAcc) {
        acc.count += other.count;
        acc.sum += other.sum;
        acc.min = acc.min.min(other.min);
        acc.max = acc.max.max(other.max);
    }

    fn finish(&self, acc: &NumericAcc) -> anyhow::Result<Payload> {
        let empty = acc.count == 0;
        let value = match self.kind {
            AggregateKind::Count => return Ok(Payload::Long(acc.count as i64)),
            AggregateKind::Sum => acc.sum,
            AggregateKind::Min if !empty => acc.min,
            AggregateKind::Max if !empty => acc.max,
            AggregateKind::Avg if !empty => acc.sum / acc.count as f64,
            kind => anyhow::bail!("{kind:?} of an empty window is undefined"),
        };
        Ok(Payload::Double(value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
