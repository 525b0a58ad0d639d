#[cfg(test)]
mod concurrency;
#[cfg(test)]
mod matching;
#[cfg(test)]
mod serialization_deserialization;
