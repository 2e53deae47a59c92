/// Round-robin fixture generator for one league tier: the circle method,
/// fixing `clubs[0]` and rotating the rest.
///
/// Returns `2*(n-1)` rounds of `n/2` pairings each; the second half
/// mirrors the first with home/away reversed. The fixed club's home/away
/// side alternates by round parity so it doesn't play every home (or
/// away) fixture of the first half in a row.
pub fn round_robin(clubs: &[i32]) -> Result<Vec<Vec<(i32, i32)>>, String> {
    let n = clubs.len();
    if n < 2 {
        return Err("round_robin: need at least two clubs".to_string());
    }
    if n % 2 != 0 {
        return Err("round_robin: club count must be even".to_string());
    }

    let half = n / 2;
    let rounds = n - 1;
    let mut arr = clubs.to_vec();

    let mut first_half_rounds = Vec::with_capacity(rounds);

    for round in 0..rounds {
        let mut pairings = Vec::with_capacity(half);
        for i in 0..half {
            let a = arr[i];
            let b = arr[n - 1 - i];
            let (home, away) = if i == 0 {
                // the fixed club: alternate home/away by round parity
                if round % 2 == 0 { (a, b) } else { (b, a) }
            } else if (round + i) % 2 == 0 {
                (a, b)
            } else {
                (b, a)
            };
            pairings.push((home, away));
        }
        first_half_rounds.push(pairings);

        // rotate everything but the fixed position-0 club
        let last = arr.pop().expect("non-empty");
        arr.insert(1, last);
    }

    let mut all_rounds = Vec::with_capacity(rounds * 2);
    all_rounds.extend(first_half_rounds.iter().cloned());
    all_rounds.extend(
        first_half_rounds
            .iter()
            .map(|round| round.iter().map(|(h, a)| (*a, *h)).collect::<Vec<_>>()),
    );

    Ok(all_rounds)
}
