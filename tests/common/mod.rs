#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub const BOUND_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <Configuration Condition=" '$(Configuration)' == '' ">Debug</Configuration>
    <OutputType>Exe</OutputType>
    <RootNamespace>App</RootNamespace>
    <SccProjectName>SAK</SccProjectName>
    <SccLocalPath>SAK</SccLocalPath>
    <SccAuxPath>SAK</SccAuxPath>
    <SccProvider>SAK</SccProvider>
  </PropertyGroup>
  <ItemGroup>
    <Compile Include="Program.cs" />
  </ItemGroup>
</Project>
"#;

pub const BOUND_SOLUTION: &str = "
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio 2012
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"proj\\App.csproj\", \"{0B5F1A76-42D8-4E8B-9E5B-4D4B8C1C7A10}\"
EndProject
Global
	GlobalSection(TeamFoundationVersionControl) = preSolution
		SccNumberOfProjects = 2
		SccEnterpriseProvider = {4CA58AB2-18FA-4F8D-95D4-32DDF27D184C}
		SccTeamFoundationServer = http://tfs:8080/tfs/defaultcollection
		SccLocalPath0 = .
	EndGlobalSection
	GlobalSection(SolutionConfigurationPlatforms) = preSolution
		Debug|Any CPU = Debug|Any CPU
		Release|Any CPU = Release|Any CPU
	EndGlobalSection
EndGlobal
";

pub const README: &str = "# App\n\nBuild with msbuild.\n";

/// Lay out the standard scenario: one project with build output, a bound
/// solution at the root and an unrelated readme.
pub fn create_scenario(root: &Path) {
    fs::create_dir_all(root.join("proj/bin/Debug")).unwrap();
    fs::write(root.join("proj/bin/Debug/App.exe"), "MZ").unwrap();
    fs::create_dir_all(root.join("proj/obj/Debug")).unwrap();
    fs::write(root.join("proj/obj/Debug/App.pdb"), "pdb").unwrap();
    fs::write(root.join("proj/App.csproj"), BOUND_PROJECT).unwrap();
    fs::write(root.join("solution.sln"), BOUND_SOLUTION).unwrap();
    fs::write(root.join("readme.md"), README).unwrap();
}
