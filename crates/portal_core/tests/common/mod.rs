const BLOCK_LEN: usize = 2880;
const CARD_LEN: usize = 80;

/// Serialises a float32 image with extra header cards.
pub fn encode_f32_image(
    width: usize,
    height: usize,
    cards: &[(&str, String)],
    pixels: &[f32],
) -> Vec<u8> {
    let mut header = vec![
        ("SIMPLE", "T".to_string()),
        ("BITPIX", "-32".to_string()),
        ("NAXIS", "2".to_string()),
        ("NAXIS1", width.to_string()),
        ("NAXIS2", height.to_string()),
    ];
    header.extend(cards.iter().map(|(k, v)| (*k, v.clone())));

    let mut bytes = Vec::new();
    for (key, value) in header {
        bytes.extend_from_slice(format!("{key:<8}= {value:>20}").as_bytes());
        let pad = CARD_LEN - bytes.len() % CARD_LEN;
        if pad != CARD_LEN {
            bytes.resize(bytes.len() + pad, b' ');
        }
    }
    bytes.extend_from_slice(format!("{:<80}", "END").as_bytes());
    bytes.resize(bytes.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, b' ');

    for pixel in pixels {
        bytes.extend_from_slice(&pixel.to_be_bytes());
    }
    bytes.resize(bytes.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, 0);
    bytes
}
