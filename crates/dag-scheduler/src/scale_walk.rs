// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! SCALE-length computation and `Var(path)` component lookup (§4.G
//! step 2d): "SCALE-walk the decoded parameter tuple along `path`,
//! then append the byte-range of the selected component."

use chain_executor_types::{AbiParam, AbiType};
use parity_scale_codec::{Compact, Decode};

/// Number of bytes `ty`'s SCALE encoding occupies at the front of
/// `buf`, or `None` if `buf` is too short or malformed for `ty`.
pub fn scale_len(ty: &AbiType, buf: &[u8]) -> Option<usize> {
    match ty {
        AbiType::U8 | AbiType::Bool => (buf.len() >= 1).then_some(1),
        AbiType::U32 => (buf.len() >= 4).then_some(4),
        AbiType::U64 => (buf.len() >= 8).then_some(8),
        AbiType::U128 => (buf.len() >= 16).then_some(16),
        AbiType::Address => (buf.len() >= 20).then_some(20),
        AbiType::Bytes | AbiType::String => {
            let mut cursor = buf;
            let compact = Compact::<u32>::decode(&mut cursor).ok()?;
            let header = buf.len() - cursor.len();
            let n = compact.0 as usize;
            (cursor.len() >= n).then_some(header + n)
        },
        AbiType::Tuple(children) => {
            let mut offset = 0usize;
            for child in children {
                offset += scale_len(child, &buf[offset..])?;
            }
            Some(offset)
        },
        AbiType::Vec(inner) => {
            let mut cursor = buf;
            let compact = Compact::<u32>::decode(&mut cursor).ok()?;
            let mut offset = buf.len() - cursor.len();
            for _ in 0..compact.0 {
                offset += scale_len(inner, &buf[offset..])?;
            }
            Some(offset)
        },
    }
}

/// Walks `path` into `inputs` against the selector-stripped calldata
/// `data`, returning the byte range the path's final component
/// occupies. `path` indexes into `inputs` at the top level, then into
/// nested `Tuple` components for every subsequent segment.
pub fn locate(inputs: &[AbiParam], path: &[u32], data: &[u8]) -> Option<(usize, usize)> {
    if path.is_empty() {
        return None;
    }
    let mut types: Vec<AbiType> = inputs.iter().map(|p| p.ty.clone()).collect();
    let mut offset = 0usize;
    let mut selected: Option<AbiType> = None;
    for (depth, &segment) in path.iter().enumerate() {
        let segment = segment as usize;
        if segment >= types.len() {
            return None;
        }
        for sibling in &types[..segment] {
            offset += scale_len(sibling, &data[offset..])?;
        }
        let ty = types[segment].clone();
        if depth + 1 < path.len() {
            match ty {
                AbiType::Tuple(children) => types = children,
                _ => return None,
            }
        } else {
            selected = Some(ty);
        }
    }
    let ty = selected?;
    let len = scale_len(&ty, &data[offset..])?;
    Some((offset, offset + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_scalar_length() {
        assert_eq!(scale_len(&AbiType::U32, &[1, 2, 3, 4, 5]), Some(4));
    }

    #[test]
    fn compact_prefixed_bytes_length() {
        let mut buf = vec![0x04]; // Compact(1) single-byte mode: value << 2
        buf.extend_from_slice(b"x");
        assert_eq!(scale_len(&AbiType::Bytes, &buf), Some(2));
    }

    #[test]
    fn locate_second_of_two_top_level_fields() {
        let inputs = vec![
            AbiParam { name: "from".into(), ty: AbiType::U32 },
            AbiParam { name: "amount".into(), ty: AbiType::U64 },
        ];
        let mut data = 7u32.to_le_bytes().to_vec();
        data.extend_from_slice(&9u64.to_le_bytes());
        assert_eq!(locate(&inputs, &[1], &data), Some((4, 12)));
    }

    #[test]
    fn locate_descends_into_tuple() {
        let inputs = vec![AbiParam {
            name: "pair".into(),
            ty: AbiType::Tuple(vec![AbiType::U32, AbiType::U32]),
        }];
        let data = [1u8, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(locate(&inputs, &[0, 1], &data), Some((4, 8)));
    }
}
