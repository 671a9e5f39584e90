// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rename_images::describe::clean_response;
use rename_images::naming::FilenameSynthesizer;

#[derive(Arbitrary, Debug)]
struct Input {
    description: String,
    max_length: u8,
}

fuzz_target!(|input: Input| {
    let max_length = usize::from(input.max_length).max(24);
    let synthesizer = FilenameSynthesizer::new(max_length, "image");
    let name = synthesizer.synthesize(&clean_response(&input.description), None);

    assert!(!name.is_empty());
    assert!(name.len() <= max_length);
    assert!(name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    assert!(!name.starts_with('-') && !name.ends_with('-'));
    assert!(!name.contains("--"));
});
