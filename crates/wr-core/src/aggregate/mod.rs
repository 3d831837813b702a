mod numeric;

pub use numeric::{NumericAcc, NumericAggregate};

/// User-supplied associative aggregation over the events of one window.
///
/// The engine owns each accumulator exclusively. [`finish`](Self::finish)
/// takes the accumulator by shared reference: it is a pure projection and
/// may run any number of times (once per early result, once more for the
/// final result) without disturbing ongoing accumulation.
pub trait AggregateOp {
    type Event;
    type Acc;
    type Output;

    /// Fresh accumulator for a newly referenced window.
    fn init(&self) -> Self::Acc;

    /// Fold one event into the accumulator.
    fn accumulate(&self, acc: &mut Self::Acc, event: &Self::Event) -> anyhow::Result<()>;

    /// Merge a partial accumulator (e.g. from another shard) into `acc`.
    fn combine(&self, acc: &mut Self::Acc, other: Self::Acc);

    /// Project the accumulator to the externally visible result.
    fn finish(&self, acc: &Self::Acc) -> anyhow::Result<Self::Output>;
}
