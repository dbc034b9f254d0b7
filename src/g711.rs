// riffwav -- A WAV encoding and decoding library in Rust
// Copyright 2024 The riffwav Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ITU-T G.711 companding.
//!
//! Both A-law and µ-law map an 8-bit code to a 16-bit linear PCM value. The
//! codes are stored with some of their bits inverted (all bits for µ-law,
//! the even bits for A-law), which is why the expansion starts by undoing
//! that inversion.

const SIGN_BIT: u8 = 0x80;
const QUANT_MASK: u8 = 0x0f;
const SEG_MASK: u8 = 0x70;
const SEG_SHIFT: u8 = 4;

/// Bias added to µ-law magnitudes before segment lookup.
const ULAW_BIAS: i32 = 0x84;

/// Largest 14-bit magnitude µ-law can represent.
const ULAW_CLIP: i32 = 8159;

/// Upper bounds of the eight A-law segments, in 13-bit magnitude units.
const SEG_AEND: [i32; 8] = [0x1f, 0x3f, 0x7f, 0xff, 0x1ff, 0x3ff, 0x7ff, 0xfff];

/// Upper bounds of the eight µ-law segments, in biased 14-bit magnitude units.
const SEG_UEND: [i32; 8] = [0x3f, 0x7f, 0xff, 0x1ff, 0x3ff, 0x7ff, 0xfff, 0x1fff];

/// Returns the index of the first segment that can hold `value`, or 8 if none can.
#[inline(always)]
fn segment(value: i32, ends: &[i32; 8]) -> u8 {
    ends.iter().position(|&end| value <= end).unwrap_or(8) as u8
}

/// Expands an A-law code to a 16-bit linear PCM value.
pub fn alaw_to_linear(code: u8) -> i16 {
    let a = code ^ 0x55;
    let mut t = i32::from(a & QUANT_MASK) << 4;
    let seg = (a & SEG_MASK) >> SEG_SHIFT;
    match seg {
        0 => t += 8,
        1 => t += 0x108,
        _ => {
            t += 0x108;
            t <<= seg - 1;
        }
    }
    if a & SIGN_BIT != 0 {
        t as i16
    } else {
        -t as i16
    }
}

/// Compresses a 16-bit linear PCM value to an A-law code.
pub fn linear_to_alaw(pcm: i16) -> u8 {
    // A-law operates on 13-bit magnitudes.
    let mut pcm = i32::from(pcm) >> 3;
    let mask = if pcm >= 0 {
        0xd5
    } else {
        pcm = -pcm - 1;
        0x55
    };

    let seg = segment(pcm, &SEG_AEND);
    if seg >= 8 {
        return 0x7f ^ mask;
    }

    let quant = if seg < 2 { pcm >> 1 } else { pcm >> seg };
    ((seg << SEG_SHIFT) | (quant as u8 & QUANT_MASK)) ^ mask
}

/// Expands a µ-law code to a 16-bit linear PCM value.
pub fn ulaw_to_linear(code: u8) -> i16 {
    let u = !code;
    let mut t = (i32::from(u & QUANT_MASK) << 3) + ULAW_BIAS;
    t <<= (u & SEG_MASK) >> SEG_SHIFT;
    if u & SIGN_BIT != 0 {
        (ULAW_BIAS - t) as i16
    } else {
        (t - ULAW_BIAS) as i16
    }
}

/// Compresses a 16-bit linear PCM value to a µ-law code.
pub fn linear_to_ulaw(pcm: i16) -> u8 {
    // µ-law operates on 14-bit magnitudes.
    let mut pcm = i32::from(pcm) >> 2;
    let mask = if pcm < 0 {
        pcm = -pcm;
        0x7f
    } else {
        0xff
    };

    pcm = pcm.min(ULAW_CLIP) + (ULAW_BIAS >> 2);

    let seg = segment(pcm, &SEG_UEND);
    if seg >= 8 {
        return 0x7f ^ mask;
    }

    let quant = (pcm >> (seg + 1)) as u8 & QUANT_MASK;
    ((seg << SEG_SHIFT) | quant) ^ mask
}
