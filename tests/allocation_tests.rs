mod common;

use bubblebuff::data::roster::{CasterCapabilities, Character};
use bubblebuff::data::SavedBufferState;
use bubblebuff::engine::allocation::verify;
use bubblebuff::engine::{run_pass, AllowAll, Assignment, BubbleBuff, Catalog, EffectKey};
use bubblebuff::planner::BufferState;
use common::*;

fn key(buff: u128) -> EffectKey {
    EffectKey::from_buffs([uuid(buff)]).expect("non-empty key")
}

fn want(catalog: &mut Catalog, buff: u128, members: &[usize]) {
    let aggregate = catalog.buff_mut(&key(buff)).expect("buff cataloged");
    for &member in members {
        aggregate
            .set_unit_wants(member, true)
            .expect("member in range");
    }
}

fn given(buff: &BubbleBuff) -> Vec<bool> {
    (0..buff.roster_len()).map(|i| buff.unit_given(i)).collect()
}

fn bless_party() -> Vec<Character> {
    vec![
        oracle("a", "Oracle", 100, 1, vec![bless()]),
        oracle("b", "Cleric", 101, 3, vec![bless()]),
        fighter("c", "Fighter"),
        fighter("d", "Rogue"),
    ]
}

#[test]
fn shared_bless_covers_everyone_until_a_caster_is_banned() {
    let roster = bless_party();
    let mut state = BufferState::new(SavedBufferState::new());
    state.recalculate(&roster, &AllowAll, false).expect("first pass");
    let bless_key = key(BLESS_BUFF);
    state.set_all_wants(&bless_key, true).expect("want all");

    state.recalculate(&roster, &AllowAll, false).expect("pass");
    let buff = state.buff(&bless_key).expect("bless");
    assert_eq!(buff.requested(), 4);
    assert_eq!(buff.fulfilled(), 4);
    assert_eq!(buff.providers()[0].spent(), 1);
    assert_eq!(buff.providers()[1].spent(), 3);

    state.set_banned(&bless_key, 0, true).expect("ban oracle");
    state.recalculate(&roster, &AllowAll, false).expect("pass");
    let buff = state.buff(&bless_key).expect("bless");
    assert_eq!(buff.fulfilled(), 3);
    assert_eq!(buff.providers()[0].spent(), 0);
    assert_eq!(given(buff), vec![true, true, true, false]);
}

#[test]
fn one_mass_cast_covers_the_party_from_a_single_request() {
    let mut roster = vec![oracle("a", "Wizard", 100, 1, vec![mass_haste()])];
    for i in 1..6 {
        roster.push(fighter(&format!("m{i}"), &format!("Member {i}")));
    }
    let mut catalog = Catalog::build(&roster);
    want(&mut catalog, HASTE_BUFF, &[4]);
    catalog
        .buff_mut(&key(HASTE_BUFF))
        .expect("haste")
        .set_unit_wants(5, false)
        .expect("opt out");

    let summary = run_pass(&mut catalog, &AllowAll).expect("pass");
    let haste = catalog.get(&key(HASTE_BUFF)).expect("haste");
    assert!(haste.is_mass);
    assert_eq!(haste.requested(), 1);
    assert_eq!(haste.fulfilled(), 1);
    assert_eq!(given(haste), vec![true, true, true, true, true, false]);
    assert_eq!(
        haste.assignments(),
        &[Assignment {
            provider: 0,
            target: 4
        }]
    );
    assert_eq!(summary.credits_committed, 1);
}

#[test]
fn mass_cast_skips_members_it_cannot_target() {
    let mut roster = vec![oracle("a", "Wizard", 100, 1, vec![mass_haste()])];
    for i in 1..6 {
        roster.push(fighter(&format!("m{i}"), &format!("Member {i}")));
    }
    let mut catalog = Catalog::build(&roster);
    want(&mut catalog, HASTE_BUFF, &[2]);
    let immune_fourth = |_: &BubbleBuff, target: usize| target != 4;

    let summary = run_pass(&mut catalog, &immune_fourth).expect("pass");
    let haste = catalog.get(&key(HASTE_BUFF)).expect("haste");
    assert!(!haste.can_target(4));
    assert_eq!(given(haste), vec![true, true, true, true, false, true]);
    assert_eq!(haste.fulfilled(), 1);
    assert_eq!(summary.credits_committed, 1);
}

#[test]
fn earlier_buffs_win_a_shared_level_pool() {
    let roster = vec![
        oracle("a", "Oracle", 100, 2, vec![bless(), shield_of_faith()]),
        fighter("b", "Fighter"),
    ];
    let mut catalog = Catalog::build(&roster);
    want(&mut catalog, BLESS_BUFF, &[0, 1]);
    want(&mut catalog, SHIELD_BUFF, &[1]);
    run_pass(&mut catalog, &AllowAll).expect("pass");

    assert_eq!(catalog.get(&key(BLESS_BUFF)).map(|b| b.fulfilled()), Some(2));
    assert_eq!(catalog.get(&key(SHIELD_BUFF)).map(|b| b.fulfilled()), Some(0));
    let pool = catalog.buffs()[0].providers()[0].pools[0];
    assert_eq!(catalog.pools().get(pool).map(|p| p.remaining()), Some(0));
}

#[test]
fn passes_are_idempotent_and_deterministic() {
    let roster = bless_party();
    let build = || {
        let mut catalog = Catalog::build(&roster);
        want(&mut catalog, BLESS_BUFF, &[3, 1, 2]);
        catalog
    };
    let mut first = build();
    let mut second = build();
    run_pass(&mut first, &AllowAll).expect("pass");
    let once: Vec<Assignment> = first.buffs()[0].assignments().to_vec();
    let committed_once = first.pools().total_committed();
    run_pass(&mut first, &AllowAll).expect("repeat pass");
    run_pass(&mut second, &AllowAll).expect("independent pass");

    assert_eq!(first.buffs()[0].assignments(), once.as_slice());
    assert_eq!(first.pools().total_committed(), committed_once);
    assert_eq!(second.buffs()[0].assignments(), once.as_slice());
    assert_eq!(given(&first.buffs()[0]), given(&second.buffs()[0]));
}

#[test]
fn credits_are_conserved_for_every_request_pattern() {
    let roster = vec![
        oracle("a", "Oracle", 100, 2, vec![bless(), shield_of_faith(), mass_haste()]),
        innate("b", "Paladin", enlarge_self()),
        oracle("c", "Cleric", 101, 1, vec![shield_of_faith(), bless()]),
        fighter("d", "Fighter"),
    ];
    let buffs = [BLESS_BUFF, SHIELD_BUFF, HASTE_BUFF, ENLARGE_BUFF];
    for pattern in 0u32..(1 << 8) {
        let mut catalog = Catalog::build(&roster);
        for (slot, &buff) in buffs.iter().enumerate() {
            let members: Vec<usize> = (0..4)
                .filter(|m| pattern & (1 << ((slot * 2 + m) % 8)) != 0)
                .collect();
            want(&mut catalog, buff, &members);
        }
        run_pass(&mut catalog, &AllowAll).expect("pass");
        let (buffs_view, pools) = (catalog.buffs(), catalog.pools());
        verify(buffs_view, pools).expect("invariants hold");
        for (_, pool) in pools.iter() {
            assert!(pool.committed() <= pool.capacity());
        }
        for buff in buffs_view {
            assert!(buff.fulfilled() <= buff.requested());
            for provider in buff.providers() {
                assert!(provider.spent() <= provider.clamp);
            }
        }
    }
}

#[test]
fn self_only_transmutation_reaches_allies_only_with_share_enabled() {
    let caster = innate("a", "Alchemist", enlarge_self()).with_capabilities(CasterCapabilities {
        share_transmutation: true,
        powerful_change: false,
    });
    let roster = vec![caster, fighter("b", "Fighter")];
    let enlarge = key(ENLARGE_BUFF);
    let mut state = BufferState::new(SavedBufferState::new());
    state.recalculate(&roster, &AllowAll, false).expect("pass");
    state.set_unit_wants(&enlarge, 1, true).expect("want");

    state.recalculate(&roster, &AllowAll, false).expect("pass");
    assert_eq!(state.buff(&enlarge).map(|b| b.fulfilled()), Some(0));

    state
        .set_share_transmutation(&enlarge, 0, true)
        .expect("caster has the feat");
    state.recalculate(&roster, &AllowAll, false).expect("pass");
    let buff = state.buff(&enlarge).expect("enlarge");
    assert_eq!(buff.fulfilled(), 1);
    assert!(buff.unit_given(1));

    // Still clamped to one cast even when the owner wants it too.
    state.set_unit_wants(&enlarge, 0, true).expect("want");
    state.recalculate(&roster, &AllowAll, false).expect("pass");
    let buff = state.buff(&enlarge).expect("enlarge");
    assert_eq!(buff.fulfilled(), 1);
    assert!(buff.unit_given(0));
}

#[test]
fn custom_cap_holds_back_credits_for_later_buffs() {
    let roster = vec![
        oracle("a", "Oracle", 100, 2, vec![bless(), shield_of_faith()]),
        fighter("b", "Fighter"),
    ];
    let bless_key = key(BLESS_BUFF);
    let shield_key = key(SHIELD_BUFF);
    let mut state = BufferState::new(SavedBufferState::new());
    state.recalculate(&roster, &AllowAll, false).expect("pass");
    state.set_all_wants(&bless_key, true).expect("want bless");
    state.set_unit_wants(&shield_key, 1, true).expect("want shield");
    assert_eq!(state.adjust_cap(&bless_key, 0, -1).expect("cap"), 1);

    state.recalculate(&roster, &AllowAll, false).expect("pass");
    assert_eq!(state.buff(&bless_key).map(|b| b.fulfilled()), Some(1));
    assert_eq!(state.buff(&shield_key).map(|b| b.fulfilled()), Some(1));
}

#[test]
fn untargetable_members_are_never_given() {
    let roster = bless_party();
    let mut catalog = Catalog::build(&roster);
    want(&mut catalog, BLESS_BUFF, &[0, 1, 2, 3]);
    let not_rogue = |_: &BubbleBuff, target: usize| target != 3;
    run_pass(&mut catalog, &not_rogue).expect("pass");
    let buff = catalog.get(&key(BLESS_BUFF)).expect("bless");
    assert_eq!(buff.fulfilled(), 3);
    assert!(!buff.can_target(3));
    assert!(!buff.unit_given(3));
}
