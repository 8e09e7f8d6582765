//! Random room names in the form `descriptor-genre`

use rand::seq::SliceRandom;
use rand::Rng;

const DESCRIPTORS: &[&str] = &[
    "funky", "mellow", "groovy", "smooth", "dreamy", "electric", "velvet", "cosmic", "sunny",
    "midnight", "lazy", "golden", "hazy", "wild", "gentle", "neon", "rainy", "salty",
    "late night", "slow burning", "wide awake", "sun kissed",
];

const GENRES: &[&str] = &[
    "jazz", "disco", "funk", "soul", "house", "techno", "reggae", "blues", "folk", "punk",
    "ambient", "bossa nova", "hip hop", "drum and bass", "dream pop", "city pop", "synthwave",
    "afrobeat", "dub", "garage",
];

fn slug(words: &str) -> String {
    words.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Pick a room name with the given random source
pub fn generate_room_name_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let descriptor = DESCRIPTORS.choose(rng).copied().unwrap_or("funky");
    let genre = GENRES.choose(rng).copied().unwrap_or("jazz");
    format!("{}-{}", slug(descriptor), slug(genre))
}

/// Pick a room name
pub fn generate_room_name() -> String {
    generate_room_name_with(&mut rand::thread_rng())
}
