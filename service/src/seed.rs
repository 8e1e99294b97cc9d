//! Built-in seed entries loaded into an empty collection on first start.

/// The initial Portuguese dictionary, as `(word, definition)` pairs.
/// Ids are assigned in this order, starting at 1.
pub const SEED_ENTRIES: &[(&str, &str)] = &[
    ("banana", "fruta tropical amarela rica em potássio"),
    ("abacaxi", "fruta tropical com casca áspera e sabor agridoce"),
    ("lar", "local onde alguém mora"),
    ("casa", "local onde alguém mora"),
    ("moradia", "local onde alguém mora, casa, residência"),
    ("felicidade", "sentimento positivo de alegria e contentamento"),
    ("tristeza", "sentimento negativo de melancolia e infelicidade"),
    (
        "amizade",
        "relação afetiva entre pessoas baseada em confiança e carinho",
    ),
    ("melão", "fruta tropical de casca verde e polpa doce"),
    (
        "ciúmes",
        "sentimento de insegurança e possessividade em relação a algo ou alguém",
    ),
    ("Jacarta", "capital da Indonésia"),
    ("Brasília", "capital do Brasil"),
];
