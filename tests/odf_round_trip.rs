use rusty_odf::coupler::CouplerType;
use rusty_odf::drawstop::DrawstopFunction;
use rusty_odf::ids::{HasId, ManualId};
use rusty_odf::reversible_piston::PistonTarget;
use rusty_odf::stop::RankReference;
use rusty_odf::tremulant::TremulantType;
use rusty_odf::{Organ, OrganFileParser};

fn written_lines(organ: &Organ) -> Vec<String> {
    organ.write_organ().lines().to_vec()
}

fn section<'a>(lines: &'a [String], name: &str) -> &'a [String] {
    let header = format!("[{}]", name);
    let Some(start) = lines.iter().position(|l| *l == header) else {
        return &[];
    };
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.starts_with('['))
        .map_or(lines.len(), |i| start + 1 + i);
    &lines[start + 1..end]
}

fn has_line(lines: &[String], line: &str) -> bool {
    lines.iter().any(|l| l == line)
}

/// Pedal, two manuals and one of every element kind, cross referenced.
fn build_organ() -> (Organ, Vec<ManualId>) {
    let mut organ = Organ::new();
    organ.church_name = "St. Test".to_string();
    organ.church_address = "Main Street 1".to_string();
    organ.organ_builder = "Builder & Sons".to_string();
    organ.divisionals_store_tremulants = false;

    let pedal = organ.add_manual(true).unwrap();
    let great = organ.add_manual(false).unwrap();
    let swell = organ.add_manual(false).unwrap();
    organ.manual_mut(great).unwrap().name = "Great".to_string();
    organ.manual_mut(swell).unwrap().name = "Swell".to_string();
    organ.manual_mut(pedal).unwrap().name = "Pedal".to_string();

    let enclosure = organ.add_enclosure();
    organ.enclosure_mut(enclosure).unwrap().name = "Swell box".to_string();

    let tremulant = organ.add_tremulant();
    {
        let tremulant = organ.tremulant_mut(tremulant).unwrap();
        tremulant.drawstop.button.set_name("Tremulant");
        tremulant.trem_type = TremulantType::Synth;
        tremulant.period = 200;
    }
    organ.manual_mut(swell).unwrap().add_tremulant(tremulant);

    let input = organ.add_switch();
    let gate = organ.add_switch();
    organ.switch_mut(input).unwrap().drawstop.button.set_name("Input");
    {
        let gate = organ.switch_mut(gate).unwrap();
        gate.drawstop.button.set_name("Gate");
        gate.drawstop.set_function(DrawstopFunction::Not);
        gate.drawstop.add_switch_reference(input);
    }
    organ.manual_mut(great).unwrap().add_switch(input);

    let windchest = organ.add_windchest_group();
    {
        let windchest = organ.windchest_group_mut(windchest).unwrap();
        windchest.name = "Swell chest".to_string();
        windchest.add_enclosure(enclosure);
        windchest.add_tremulant(tremulant);
    }

    let rank = organ.add_rank();
    {
        let rank = organ.rank_mut(rank).unwrap();
        rank.name = "Principal 8".to_string();
        rank.windchest = Some(windchest);
        rank.set_number_of_logical_pipes(4);
        rank.pipes_mut()[1].sample = "Principal/037.wav".to_string();
        rank.pipes_mut()[1].acoustics.gain = -3.5;
    }

    let principal = organ.add_stop(great).unwrap();
    {
        let reference = RankReference::whole(organ.rank(rank).unwrap());
        let stop = organ.stop_mut(principal).unwrap();
        stop.drawstop.button.set_name("Principal 8");
        stop.number_of_accessible_pipes = 4;
        stop.add_rank_reference(reference);
    }
    let bourdon = organ.add_stop(pedal).unwrap();
    {
        let stop = organ.stop_mut(bourdon).unwrap();
        stop.drawstop.button.set_name("Bourdon 16");
        stop.drawstop.set_function(DrawstopFunction::And);
        stop.drawstop.add_switch_reference(input);
        stop.drawstop.add_switch_reference(gate);
        let rank = stop.internal_rank_mut().unwrap();
        rank.windchest = Some(windchest);
        rank.set_number_of_logical_pipes(2);
    }

    let coupler = organ.add_coupler(great).unwrap();
    {
        let coupler = organ.coupler_mut(coupler).unwrap();
        coupler.drawstop.button.set_name("Swell to Great");
        coupler.destination_manual = Some(swell);
        coupler.destination_keyshift = -12;
        coupler.coupler_type = CouplerType::Melody;
    }

    let divisional = organ.add_divisional(great).unwrap();
    {
        let divisional = organ.divisional_mut(divisional).unwrap();
        divisional.button.set_name("Great 1");
        divisional.stops.add(principal, true);
        divisional.couplers.add(coupler, false);
        divisional.switches.add(input, true);
    }

    let divisional_coupler = organ.add_divisional_coupler();
    {
        let divisional_coupler = organ.divisional_coupler_mut(divisional_coupler).unwrap();
        divisional_coupler.drawstop.button.set_name("Great to Swell");
        divisional_coupler.bi_directional_coupling = true;
        divisional_coupler.add_manual(great);
        divisional_coupler.add_manual(swell);
    }

    let general = organ.add_general();
    {
        let general = organ.general_mut(general).unwrap();
        general.button.set_name("General 1");
        general.stops.add(bourdon, true);
        general.stops.add(principal, false);
        general.tremulants.add(tremulant, true);
        general.divisional_couplers.add(divisional_coupler, true);
    }

    let piston = organ.add_reversible_piston();
    {
        let piston = organ.reversible_piston_mut(piston).unwrap();
        piston.button.set_name("Tutti");
        piston.set_coupler(coupler);
    }

    (organ, vec![pedal, great, swell])
}

#[test]
fn full_organ_survives_parse_and_write() {
    let (organ, _) = build_organ();
    let first = organ.write_organ().to_text();
    let parsed = OrganFileParser::parse_str(&first).unwrap();
    let second = parsed.write_organ().to_text();
    assert_eq!(first, second, "Writing a parsed organ must reproduce the file");

    assert_eq!(parsed.church_name, "St. Test");
    assert!(!parsed.divisionals_store_tremulants);
    assert!(parsed.has_pedal());
    assert_eq!(parsed.number_of_manuals(), 2);
    assert_eq!(parsed.manuals()[1].name, "Great");
    assert_eq!(parsed.all_stops().count(), 2);
    assert_eq!(parsed.switches()[1].drawstop.function(), DrawstopFunction::Not);

    let pedal_stop = &parsed.manuals()[0].stops()[0];
    assert!(pedal_stop.is_using_internal_rank());
    assert_eq!(pedal_stop.drawstop.switches().len(), 2);
    assert_eq!(
        pedal_stop.internal_rank().unwrap().windchest,
        Some(parsed.windchest_groups()[0].id())
    );

    let great_stop = &parsed.manuals()[1].stops()[0];
    assert_eq!(great_stop.rank_references()[0].rank, parsed.ranks()[0].id());
    assert_eq!(parsed.ranks()[0].pipes()[1].sample, "Principal/037.wav");
    assert_eq!(parsed.ranks()[0].pipes()[1].acoustics.gain, -3.5);

    let coupler = &parsed.manuals()[1].couplers()[0];
    assert_eq!(coupler.destination_manual, Some(parsed.manuals()[2].id()));
    assert_eq!(coupler.coupler_type, CouplerType::Melody);
    assert_eq!(parsed.reversible_pistons()[0].coupler(), Some(coupler.id()));

    let general = &parsed.generals()[0];
    let stops: Vec<_> = general.stops.iter().map(|a| (a.id, a.is_on)).collect();
    assert_eq!(stops, [(pedal_stop.id(), true), (great_stop.id(), false)]);
}

#[test]
fn general_stop_entries_carry_manual_numbers() {
    let (organ, _) = build_organ();
    let lines = written_lines(&organ);
    let general = section(&lines, "General001");
    assert!(has_line(general, "NumberOfStops=2"));
    assert!(has_line(general, "StopManual001=0"));
    assert!(has_line(general, "Stop001=1"));
    assert!(has_line(general, "StopManual002=1"));
    assert!(has_line(general, "Stop002=-1"));
}

#[test]
fn coupler_round_trip_through_file() {
    let mut organ = Organ::new();
    organ.add_manual(true).unwrap();
    let first = organ.add_manual(false).unwrap();
    let second = organ.add_manual(false).unwrap();
    organ.add_manual(false).unwrap();

    let coupler = organ.add_coupler(first).unwrap();
    {
        let coupler = organ.coupler_mut(coupler).unwrap();
        coupler.drawstop.button.set_name("Coupler");
        coupler.unison_off = false;
        coupler.destination_manual = Some(second);
        coupler.destination_keyshift = 12;
        coupler.coupler_type = CouplerType::Normal;
        coupler.couple_to_subsequent_unison_intermanual_couplers = true;
        coupler.couple_to_subsequent_upward_intermanual_couplers = true;
        coupler.couple_to_subsequent_downward_intermanual_couplers = true;
        coupler.couple_to_subsequent_upward_intramanual_couplers = true;
        coupler.couple_to_subsequent_downward_intramanual_couplers = true;
    }

    let parsed = OrganFileParser::parse_str(&organ.write_organ().to_text()).unwrap();
    let read = &parsed.manuals()[1].couplers()[0];
    assert_eq!(read.destination_keyshift, 12);
    assert_eq!(read.destination_manual, Some(parsed.manuals()[2].id()));
    assert!(read.couple_to_subsequent_unison_intermanual_couplers);
    assert!(read.couple_to_subsequent_upward_intermanual_couplers);
    assert!(read.couple_to_subsequent_downward_intermanual_couplers);
    assert!(read.couple_to_subsequent_upward_intramanual_couplers);
    assert!(read.couple_to_subsequent_downward_intramanual_couplers);
}

#[test]
fn not_function_writes_only_the_first_switch() {
    let mut organ = Organ::new();
    let a = organ.add_switch();
    let b = organ.add_switch();
    let c = organ.add_switch();
    {
        let drawstop = &mut organ.switch_mut(c).unwrap().drawstop;
        drawstop.set_function(DrawstopFunction::Not);
        drawstop.add_switch_reference(a);
        drawstop.add_switch_reference(b);
    }
    let lines = written_lines(&organ);
    let switch = section(&lines, "Switch003");
    assert!(has_line(switch, "Function=Not"));
    assert_eq!(switch.iter().filter(|l| l.starts_with("Switch0")).count(), 1);
    assert!(has_line(switch, "Switch001=1"));
    assert!(!switch.iter().any(|l| l.starts_with("SwitchCount")));
}

#[test]
fn stop_mode_follows_number_of_ranks() {
    let header = "[Organ]\nHasPedals=N\nNumberOfManuals=1\nNumberOfWindchestGroups=1\nNumberOfRanks=2\n\
                  [WindchestGroup001]\nName=Main\n\
                  [Rank001]\nName=A\nWindchestGroup=1\nNumberOfLogicalPipes=1\nPipe001=DUMMY\n\
                  [Rank002]\nName=B\nWindchestGroup=1\nNumberOfLogicalPipes=1\nPipe001=DUMMY\n\
                  [Manual001]\nName=Great\nNumberOfStops=1\nStop001=1\n";

    let referenced = format!("{}[Stop001]\nName=Mixture\nNumberOfRanks=2\nRank001=1\nRank002=2\n", header);
    let organ = OrganFileParser::parse_str(&referenced).unwrap();
    let stop = &organ.manuals()[0].stops()[0];
    assert!(!stop.is_using_internal_rank());
    assert_eq!(stop.number_of_ranks(), 2);

    let internal = format!("{}[Stop001]\nName=Flute\nNumberOfLogicalPipes=2\nPipe001=DUMMY\nPipe002=DUMMY\n", header);
    let organ = OrganFileParser::parse_str(&internal).unwrap();
    let stop = &organ.manuals()[0].stops()[0];
    assert!(stop.is_using_internal_rank());
    assert_eq!(stop.internal_rank().unwrap().number_of_logical_pipes(), 2);
}

#[test]
fn written_positions_follow_reordering() {
    let (mut organ, manuals) = build_organ();
    let great = manuals[1];
    let flute = organ.add_stop(great).unwrap();
    organ.stop_mut(flute).unwrap().drawstop.button.set_name("Flute");

    let lines = written_lines(&organ);
    assert!(has_line(section(&lines, "Divisional001"), "Stop001=1"));

    organ.move_stop(great, 1, 0).unwrap();
    let lines = written_lines(&organ);
    let divisional = section(&lines, "Divisional001");
    assert!(has_line(divisional, "Stop001=2"), "The principal is now the second stop");
    let general = section(&lines, "General001");
    assert!(has_line(general, "Stop002=-2"));
    assert!(has_line(section(&lines, "Stop002"), "Name=Flute"));

    // Swapping the manuals renumbers the coupler destination.
    organ.move_manual(2, 1).unwrap();
    let lines = written_lines(&organ);
    assert!(has_line(section(&lines, "Manual001"), "Name=Swell"));
    assert!(has_line(section(&lines, "Coupler001"), "DestinationManual=1"));
    assert!(has_line(section(&lines, "ReversiblePiston001"), "ManualNumber=2"));
}

#[test]
fn out_of_range_values_keep_defaults() {
    let organ = OrganFileParser::parse_str(
        "[Organ]\nHasPedals=N\nNumberOfManuals=2\nNumberOfEnclosures=1\nNumberOfTremulants=1\n\
         [Enclosure001]\nName=Box\nAmpMinimumLevel=150\nMIDIInputNumber=-3\n\
         [Tremulant001]\nName=Trem\nPeriod=5\nStartRate=101\nStopRate=50\n\
         [Manual001]\nName=I\nNumberOfLogicalKeys=900\nFirstAccessibleKeyMIDINoteNumber=128\nNumberOfCouplers=1\nCoupler001=1\n\
         [Manual002]\nName=II\n\
         [Coupler001]\nName=II/I\nDestinationManual=2\nDestinationKeyshift=25\nNumberOfKeys=200\n",
    )
    .unwrap();

    let enclosure = &organ.enclosures()[0];
    assert_eq!(enclosure.amp_minimum_level, 1);
    assert_eq!(enclosure.midi_input_number, 0);

    let tremulant = &organ.tremulants()[0];
    assert_eq!(tremulant.period, 160);
    assert_eq!(tremulant.start_rate, 8);
    assert_eq!(tremulant.stop_rate, 50);

    let manual = &organ.manuals()[0];
    assert_eq!(manual.number_of_logical_keys, 61);
    assert_eq!(manual.first_accessible_key_midi_note_number, 36);

    let coupler = &manual.couplers()[0];
    assert_eq!(coupler.destination_keyshift, 0);
    assert_eq!(coupler.number_of_keys, 127);
    assert_eq!(coupler.destination_manual, Some(organ.manuals()[1].id()));
}

#[test]
fn out_of_range_keys_and_pipe_numbers_keep_defaults() {
    let organ = OrganFileParser::parse_str(
        "[Organ]\nHasPedals=N\nNumberOfManuals=1\nNumberOfWindchestGroups=1\nNumberOfRanks=1\nNumberOfReversiblePistons=2\n\
         [WindchestGroup001]\nName=Main\n\
         [Rank001]\nName=Trumpet\nWindchestGroup=1\nNumberOfLogicalPipes=193\nHarmonicNumber=1025\n\
         Pipe001=trumpet/036.wav\nPipe001HarmonicNumber=0\n\
         [Manual001]\nName=Great\nNumberOfLogicalKeys=61\nFirstAccessibleKeyLogicalKeyNumber=62\nMIDIInputNumber=201\n\
         NumberOfStops=1\nStop001=1\n\
         [Stop001]\nName=Flute\nWindchestGroup=1\nNumberOfLogicalPipes=2\n\
         FirstAccessiblePipeLogicalKeyNumber=129\nNumberOfAccessiblePipes=193\nFirstAccessiblePipeLogicalPipeNumber=0\n\
         [ReversiblePiston001]\nName=Beyond\nObjectType=STOP\nManualNumber=1\nObjectNumber=2\n\
         [ReversiblePiston002]\nName=Flute\nObjectType=STOP\nManualNumber=1\nObjectNumber=1\n",
    )
    .unwrap();

    let manual = &organ.manuals()[0];
    assert_eq!(manual.number_of_logical_keys, 61);
    assert_eq!(manual.first_accessible_key_logical_key_number, 1);
    assert_eq!(manual.midi_input_number, 0);

    let stop = &manual.stops()[0];
    assert_eq!(stop.first_accessible_pipe_logical_key_number, 1);
    assert_eq!(stop.number_of_accessible_pipes, 1);
    assert_eq!(stop.first_accessible_pipe_logical_pipe_number, 1);
    assert_eq!(stop.internal_rank().unwrap().number_of_logical_pipes(), 2);

    let rank = &organ.ranks()[0];
    assert_eq!(rank.number_of_logical_pipes(), 1);
    assert_eq!(rank.harmonic_number, 8);
    assert_eq!(rank.pipes()[0].harmonic_number, 8, "Pipes inherit the rank value");
    assert_eq!(rank.pipes()[0].sample, "trumpet/036.wav");

    let pistons = organ.reversible_pistons();
    assert_eq!(pistons[0].target(), None, "The Great has a single stop");
    assert_eq!(pistons[0].button.name(), "Beyond");
    assert_eq!(pistons[1].target(), Some(PistonTarget::Stop(stop.id())));
}

#[test]
fn removing_elements_drops_written_references() {
    let (mut organ, _) = build_organ();
    let input = organ.switches()[0].id();
    organ.remove_switch(input).unwrap();

    let lines = written_lines(&organ);
    assert!(has_line(section(&lines, "Organ"), "NumberOfSwitches=1"));
    // The Not gate lost its only input, so its function is no longer written.
    let gate = section(&lines, "Switch001");
    assert!(has_line(gate, "Name=Gate"));
    assert!(!gate.iter().any(|l| l.starts_with("Function")));
    assert!(has_line(section(&lines, "Divisional001"), "NumberOfSwitches=0"));

    let parsed = OrganFileParser::parse_str(&organ.write_organ().to_text()).unwrap();
    assert_eq!(parsed.manuals()[0].stops()[0].drawstop.switches().len(), 1);
}
