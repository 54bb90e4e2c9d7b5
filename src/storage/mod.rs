mod memory;

pub use memory::{RuntimeKeyValueStore, RuntimeStore};

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

/// Drop items equal to the one emitted just before them.
pub fn distinct_until_changed<T>(
    values: impl futures::Stream<Item = T> + Send + 'static,
) -> BoxStream<'static, T>
where
    T: Clone + PartialEq + Send + 'static,
{
    let mut last: Option<T> = None;
    values
        .filter_map(move |value| {
            let changed = last.as_ref() != Some(&value);
            if changed {
                last = Some(value.clone());
            }
            future::ready(changed.then_some(value))
        })
        .boxed()
}

/// Combine many streams into one that emits the latest value of every input.
///
/// Nothing is emitted until each input has produced at least once; after that, any
/// single update re-emits the full vector (in input order). With no inputs, a single
/// empty vector is emitted immediately.
pub fn combine_latest<T>(inputs: Vec<BoxStream<'static, T>>) -> BoxStream<'static, Vec<T>>
where
    T: Clone + Send + 'static,
{
    if inputs.is_empty() {
        return stream::once(future::ready(Vec::new())).boxed();
    }

    let mut latest: Vec<Option<T>> = vec![None; inputs.len()];
    let tagged = inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| input.map(move |value| (index, value)).boxed());

    stream::select_all(tagged)
        .filter_map(move |(index, value)| {
            latest[index] = Some(value);
            future::ready(latest.iter().cloned().collect::<Option<Vec<T>>>())
        })
        .boxed()
}
