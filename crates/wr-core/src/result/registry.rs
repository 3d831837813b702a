//! Stable `(factory_id, class_id)` identifiers for data-model types and the
//! closed decode table the outer transport dispatches through.

use super::codec::{ByteReader, CodecError, CodecResult, put_i32};
use super::payload::{Payload, ResultPayload};
use super::WindowResult;

/// Factory id shared by every data-model type in this crate.
pub const DATAMODEL_FACTORY_ID: i32 = -10;

/// Class id of [`WindowResult`] within [`DATAMODEL_FACTORY_ID`].
pub const WINDOW_RESULT_CLASS_ID: i32 = 2;

/// A type with a stable wire identity.
pub trait IdentifiedData {
    const FACTORY_ID: i32;
    const CLASS_ID: i32;

    /// Write the body (without the identity header).
    fn write_data(&self, out: &mut Vec<u8>);
}

impl<R: ResultPayload> IdentifiedData for WindowResult<R> {
    const FACTORY_ID: i32 = DATAMODEL_FACTORY_ID;
    const CLASS_ID: i32 = WINDOW_RESULT_CLASS_ID;

    fn write_data(&self, out: &mut Vec<u8>) {
        WindowResult::<R>::write_data(self, out);
    }
}

/// Every identified type this crate can decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataModel {
    WindowResult(WindowResult<Payload>),
}

type ModelDecoder = fn(&mut ByteReader<'_>) -> CodecResult<DataModel>;

const MODEL_DECODERS: &[((i32, i32), ModelDecoder)] = &[(
    (DATAMODEL_FACTORY_ID, WINDOW_RESULT_CLASS_ID),
    decode_window_result,
)];

fn decode_window_result(reader: &mut ByteReader<'_>) -> CodecResult<DataModel> {
    WindowResult::<Payload>::read_data(reader).map(DataModel::WindowResult)
}

/// Frame `value` as `[i32 factory_id][i32 class_id][body]`.
pub fn encode_identified<T: IdentifiedData>(value: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    put_i32(&mut out, T::FACTORY_ID);
    put_i32(&mut out, T::CLASS_ID);
    value.write_data(&mut out);
    out
}

/// Decode an identified frame, dispatching on its header. The buffer must
/// hold exactly one frame.
pub fn decode_identified(bytes: &[u8]) -> CodecResult<DataModel> {
    let mut reader = ByteReader::new(bytes);
    let factory_id = reader.read_i32()?;
    let class_id = reader.read_i32()?;
    let decode = MODEL_DECODERS
        .iter()
        .find(|(id, _)| *id == (factory_id, class_id))
        .map(|(_, decode)| *decode)
        .ok_or(CodecError::UnknownType {
            factory_id,
            class_id,
        })?;
    let model = decode(&mut reader)?;
    reader.finish()?;
    Ok(model)
}
