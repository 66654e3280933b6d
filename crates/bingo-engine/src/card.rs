//! Card generation from a category's word pool.
//!
//! Samples 24 distinct words uniformly without replacement, lays them out
//! row-major around the centre, and pins a pre-filled free space at (2, 2).

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use bingo_core::category::Category;
use bingo_core::error::Result;
use bingo_core::types::{Card, Square, CENTER, WORDS_PER_CARD};

/// Builds cards. Randomness is the only input besides the category.
#[derive(Debug, Default, Clone, Copy)]
pub struct CardGenerator;

impl CardGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Deal a card using the thread-local RNG.
    pub fn generate(&self, category: &Category) -> Result<Card> {
        self.generate_with_rng(category, &mut rand::rng())
    }

    /// Deal a card using the supplied RNG.
    ///
    /// Fails with `InsufficientWords` if the pool has fewer than 24 distinct
    /// words; no partial card is produced.
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        category: &Category,
        rng: &mut R,
    ) -> Result<Card> {
        category.validate()?;

        let mut pool = category.distinct_words();
        pool.shuffle(rng);
        pool.truncate(WORDS_PER_CARD);

        let mut words = pool.into_iter();
        let squares = std::array::from_fn(|row| {
            std::array::from_fn(|col| {
                if row == CENTER && col == CENTER {
                    Square::free_space(row, col)
                } else {
                    // validate() guarantees at least 24 words.
                    Square::word(row, col, words.next().unwrap_or_default())
                }
            })
        });

        let card = Card {
            id: Uuid::new_v4(),
            category: category.id.clone(),
            words: Vec::new(),
            squares,
            created_at: Utc::now(),
        };
        let words = card
            .iter_squares()
            .filter(|s| !s.is_free_space)
            .map(|s| s.word.clone())
            .collect();

        tracing::debug!(card_id = %card.id, category = %card.category, "Card generated");
        Ok(Card { words, ..card })
    }
}
