//! # D&D 5e Template
//!
//! Starter sheet for a first-level Dungeons & Dragons 5th edition character:
//! biography, ability scores, saving throws, combat, two pages of skills,
//! spells and additional traits. Page colours follow the viridis palette.

use crate::{ButtonLabel, MetaCharError, NodeId, PageId, Rgb, Sheet, StatNode};

const ABILITY_HEADER_DESC: &str = "These scores are rarely used by themselves, but are used for calculating other roll modifiers.  Ability scores indicate things like how smart or strong your character is overall, and your proficiency bonus indicates just how good they are at their particular skills.\n\nAfter an ability score, an automatically-calculated roll modifier is listed in parentheses.  Ability scores are the sum of a number you choose at character creation, any racial modifiers, and any increases gained at certain levels.\n\nThe proficiency bonus is dependent only on character level.";

const SAVING_THROW_DESC: &str = "These are rolls you make to keep something bad from happening to you.  The DM will tell you if you need to make a saving throw.  Roll 1d20 and add the indicated modifier.\n\nWhen you make your character sheet, edit the appropriate saving throws, adding your proficiency bonus using \"Add existing stat\".";

const SKILL_PAGE_DESC: &str = "Skills pertain to various activities you might attempt out of combat.  Roll 1d20 and add the appropriate modifier to make a skill check.\n\nWhen making your character sheet, be sure to add your proficiency bonus to any skills in which you are proficient, using \"Add existing stat\".  Your class and background determine skill proficiencies.";

/// The six ability bars, in sheet order.
struct Abilities {
    strength: NodeId,
    dexterity: NodeId,
    constitution: NodeId,
    intelligence: NodeId,
    wisdom: NodeId,
    charisma: NodeId,
}

/// Build the D&D 5e starter sheet.
pub fn dnd5e() -> Result<Sheet, MetaCharError> {
    let mut sheet = Sheet::new();

    let bio = PageId(0);
    sheet.set_page_color(bio, Rgb::new(0.992, 0.906, 0.145))?;
    bio_page(&mut sheet, bio)?;

    let page = next_page(&mut sheet, Rgb::new(0.624, 0.855, 0.227))?;
    let (abilities, prof) = ability_page(&mut sheet, page)?;

    let page = next_page(&mut sheet, Rgb::new(0.29, 0.757, 0.427))?;
    saving_throw_page(&mut sheet, page, &abilities)?;

    let page = next_page(&mut sheet, Rgb::new(0.122, 0.631, 0.529))?;
    combat_page(&mut sheet, page, &abilities, prof)?;

    let page = next_page(&mut sheet, Rgb::new(0.153, 0.498, 0.557))?;
    skill_page(&mut sheet, page, "Skills page 1", &first_skills(&abilities))?;

    let page = next_page(&mut sheet, Rgb::new(0.212, 0.361, 0.553))?;
    skill_page(&mut sheet, page, "Skills page 2", &second_skills(&abilities))?;

    let page = next_page(&mut sheet, Rgb::new(0.275, 0.2, 0.494))?;
    spell_page(&mut sheet, page, abilities.charisma, prof)?;

    let page = next_page(&mut sheet, Rgb::new(0.267, 0.004, 0.329))?;
    sheet.create_node(
        page,
        StatNode::plain("Additional traits", "Anything else not already covered.").full_width(),
    )?;
    sheet.create_node(
        page,
        StatNode::text("Being awesome", "blah blah blah", "General awesomeness"),
    )?;

    Ok(sheet)
}

fn next_page(sheet: &mut Sheet, color: Rgb) -> Result<PageId, MetaCharError> {
    let page = sheet.add_page();
    sheet.set_page_color(page, color)?;
    Ok(page)
}

fn bio_page(sheet: &mut Sheet, page: PageId) -> Result<(), MetaCharError> {
    let nodes = [
        StatNode::text("Name", "Name of the character", "Sample Exampleson"),
        StatNode::text(
            "Race",
            "Human, elf, dwarf, halfling, etc., including subraces.",
            "Human",
        ),
        StatNode::simple("Level", "Overall level for your character", 1),
        StatNode::text(
            "Class",
            "Like, are you a figher or a wizard or a bard or what?",
            "Toilet mage",
        ),
        StatNode::text(
            "Specialization",
            "Most classes have two or more options to choose from at an early level.",
            "",
        ),
        StatNode::text(
            "Background",
            "Who you were before you were an adventurer, or what you do now when you aren't adventuring.  Comes with a couple skill proficiencies and other perks.",
            "Sailor",
        ),
        StatNode::text(
            "Languages known",
            "Various races have their own languages that they speak.  Your character might know some of them depending on race, class, and background.",
            "Common",
        ),
        StatNode::plain(
            "Biography",
            "Fill in any extra info here.  You may also wish to add boxes for alignment, ideals, bonds, and flaws.",
        )
        .full_width(),
    ];
    for node in nodes {
        sheet.create_node(page, node)?;
    }
    Ok(())
}

fn ability_page(sheet: &mut Sheet, page: PageId) -> Result<(Abilities, NodeId), MetaCharError> {
    sheet.create_node(
        page,
        StatNode::plain("Ability Scores and Proficiency Bonus", ABILITY_HEADER_DESC).full_width(),
    )?;

    let mut ability = |short: &str, long: &str| -> Result<NodeId, MetaCharError> {
        let lower = long.to_lowercase();
        let id = sheet.create_node(
            page,
            StatNode::ability(
                short,
                format!(
                    "{long}.  To make a {lower} check, roll 1d20 and add the number in parentheses."
                ),
                Vec::new(),
            ),
        )?;
        sheet.add_owned_child(
            id,
            StatNode::simple(
                format!("Level 1 base {short}"),
                "Number you selected at level 1.",
                10,
            ),
        )?;
        sheet.add_owned_child(
            id,
            StatNode::simple("Human", format!("Human racial modifier to {lower}."), 1).signed(),
        )?;
        Ok(id)
    };

    let abilities = Abilities {
        strength: ability("STR", "Strength")?,
        dexterity: ability("DEX", "Dexterity")?,
        constitution: ability("CON", "Constitution")?,
        intelligence: ability("INT", "Intelligence")?,
        wisdom: ability("WIS", "Wisdom")?,
        charisma: ability("CHA", "Charisma")?,
    };

    let prof = sheet.create_node(
        page,
        StatNode::simple(
            "Proficiency bonus",
            "Added to d20 rolls where you are proficient in a skill, weapon, or save.  Increases at certain levels.",
            2,
        )
        .signed()
        .for_calc(),
    )?;

    Ok((abilities, prof))
}

fn saving_throw_page(
    sheet: &mut Sheet,
    page: PageId,
    abilities: &Abilities,
) -> Result<(), MetaCharError> {
    sheet.create_node(
        page,
        StatNode::plain("Saving throws", SAVING_THROW_DESC).full_width(),
    )?;

    let saves = [
        ("STR", "strength", abilities.strength),
        ("DEX", "dexterity", abilities.dexterity),
        ("CON", "constitution", abilities.constitution),
        ("INT", "intelligence", abilities.intelligence),
        ("WIS", "wisdom", abilities.wisdom),
        ("CHA", "charisma", abilities.charisma),
    ];
    for (short, long, ability) in saves {
        sheet.create_node(
            page,
            StatNode::sum(
                format!("{short} save"),
                format!("Roll modifier for {long} saving throw."),
                vec![ability],
            )
            .signed(),
        )?;
    }

    sheet.create_node(
        page,
        StatNode::counter(
            "Death save successes",
            "If you are dying, roll a d20 at the beginning of your turn.  10 or higher counts as a success.  If you get three successes, you are no longer dying.",
            0,
        ),
    )?;
    sheet.create_node(
        page,
        StatNode::counter(
            "Death save failures",
            "If you are dying, roll a d20 at the beginning of your turn.  9 or lower counts as a failure (1 as two failures).  If you get three failures, you are dead.",
            0,
        ),
    )?;
    Ok(())
}

fn combat_page(
    sheet: &mut Sheet,
    page: PageId,
    abilities: &Abilities,
    prof: NodeId,
) -> Result<(), MetaCharError> {
    let max_hp = sheet.create_node(
        page,
        StatNode::sum(
            "Max. hit points",
            "This value increases with each level according to class.  Add your CON bonus with \"Add existing stat\"; HP increases retroactively with CON increase.",
            vec![abilities.constitution],
        ),
    )?;
    sheet.add_owned_child(
        max_hp,
        StatNode::simple("Level 1 base hp", "Base hit points at level 1 for wizard.", 6),
    )?;

    sheet.create_node(
        page,
        StatNode::counter(
            "Current hit points",
            "If this gets down to zero, you are dying.",
            6,
        ),
    )?;
    sheet.create_node(
        page,
        StatNode::text(
            "Hit dice",
            "These are the dice you use to regain hit points when you rest.  Your class determines this.",
            "1d6",
        ),
    )?;

    let armor = sheet.create_node(
        page,
        StatNode::sum(
            "Armor class",
            "The higher it is, the harder you are to hit.  Check the type of armor you are wearing to see if your dexterity bonus should be added.",
            vec![abilities.dexterity],
        ),
    )?;
    sheet.add_owned_child(
        armor,
        StatNode::simple("Padded", "Armor class of padded armor.", 11),
    )?;

    let attacks = [
        (
            "Initiative",
            "Determines combat order.  Generally just your dexterity modifier.\n\nRoll 1d20 and add the modifier.",
            vec![abilities.dexterity],
        ),
        (
            "Melee attack mod.",
            "When attacking with a melee weapon, add this modifier to a 1d20 roll to determine if you hit.  Also use this modifier for attacks with a finesse weapon if your strength is better than your dexterity.  Remove the proficiency bonus if using a weapon in which you are not proficient.",
            vec![abilities.strength, prof],
        ),
        (
            "Melee damage mod.",
            "When attacking with a melee weapon, add this modifier to the damage dice for the weapon.  Also use this modifier for damage from a finesse weapon if your strength is better than your dexterity.",
            vec![abilities.strength],
        ),
        (
            "Ranged attack mod.",
            "When attacking with a ranged weapon, add this modifier to a 1d20 roll to determine if you hit.  Also use this modifier for attacks with a finesse weapon if your dexterity is better than your strength.  Remove the proficiency bonus if using a weapon in which you are not proficient.",
            vec![abilities.dexterity, prof],
        ),
        (
            "Ranged damage mod.",
            "When attacking with a melee weapon, add this modifier to the damage dice for the weapon.  Also use this modifier for damage from a finesse weapon if your dexterity is better than your strength.",
            vec![abilities.dexterity],
        ),
    ];
    for (name, description, refs) in attacks {
        sheet.create_node(page, StatNode::sum(name, description, refs).signed())?;
    }
    Ok(())
}

fn first_skills(a: &Abilities) -> [(&'static str, &'static str, NodeId); 9] {
    [
        ("Acrobatics", "n", a.dexterity),
        ("Animal handling", "n", a.wisdom),
        ("Arcana", "n", a.intelligence),
        ("Athletics", "n", a.strength),
        ("Deception", "", a.charisma),
        ("History", "", a.intelligence),
        ("Insight", "n", a.wisdom),
        ("Intimidation", "n", a.charisma),
        ("Investigation", "n", a.intelligence),
    ]
}

fn second_skills(a: &Abilities) -> [(&'static str, &'static str, NodeId); 9] {
    [
        ("Medicine", "", a.wisdom),
        ("Nature", "", a.intelligence),
        ("Perception", "", a.wisdom),
        ("Performance", "", a.charisma),
        ("Persuasion", "", a.charisma),
        ("Religion", "", a.intelligence),
        ("Sleight of Hand", "", a.dexterity),
        ("Stealth", "", a.dexterity),
        ("Survival", "", a.wisdom),
    ]
}

/// A header bar followed by one signed sum per skill.
///
/// Each skill is `(name, article suffix, ability)`; the suffix turns "a"
/// into "an" in the description.
fn skill_page(
    sheet: &mut Sheet,
    page: PageId,
    header: &str,
    skills: &[(&str, &str, NodeId)],
) -> Result<(), MetaCharError> {
    sheet.create_node(page, StatNode::plain(header, SKILL_PAGE_DESC).full_width())?;
    for (name, article, ability) in skills {
        let description = format!(
            "Roll 1d20 and add this modifier to make a{article} {} check.",
            name.to_lowercase()
        );
        sheet.create_node(
            page,
            StatNode::sum(*name, description, vec![*ability]).signed(),
        )?;
    }
    Ok(())
}

fn spell_page(
    sheet: &mut Sheet,
    page: PageId,
    casting: NodeId,
    prof: NodeId,
) -> Result<(), MetaCharError> {
    sheet.create_node(
        page,
        StatNode::plain(
            "Spells",
            "This page contains stats pertaining to spells, as well as examples of how you can store spell descriptions in rows of buttons.",
        )
        .full_width(),
    )?;
    sheet.create_node(
        page,
        StatNode::sum(
            "Spell attack mod.",
            "When using a spell where you roll to hit, add this modifier to a 1d20 roll to determine if you hit.  This will use either your INT, WIS, or CHA modifier depending on class.",
            vec![casting, prof],
        )
        .signed(),
    )?;

    let save_dc = sheet.create_node(
        page,
        StatNode::sum(
            "Spell save DC",
            "If a target of one of your spells must make a saving throw to avoid negative effects from the spell, this is the number they are trying to beat.  It is calculated with INT, WIS, or CHA depending on your class.",
            vec![casting, prof],
        ),
    )?;
    sheet.add_owned_child(
        save_dc,
        StatNode::simple("Base spell save DC", "This is always 8.", 8),
    )?;

    sheet.create_node(
        page,
        StatNode::counter(
            "Level 1 spell slots",
            "This is how many level 1 spells you can cast before you need a rest.",
            3,
        ),
    )?;
    sheet.create_node(
        page,
        StatNode::counter(
            "Level 2 spell slots",
            "This is how many level 2 spells you can cast before you need a rest.",
            1,
        ),
    )?;
    sheet.create_node(
        page,
        StatNode::text(
            "Plunger ray",
            "Here you would put a more detailed description of this spell.",
            "2d6 damage",
        ),
    )?;
    sheet.create_node(
        page,
        StatNode::three_buttons(
            "Some spell",
            "Spell description",
            ButtonLabel::new("Another spell", "Spell description"),
            ButtonLabel::new("A third spell", "Spell description"),
        ),
    )?;
    Ok(())
}
